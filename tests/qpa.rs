#[cfg(test)]
mod qpa {
    use vkcts::qpa::TestLog;
    use vkcts::status::TestStatus;

    use pretty_assertions::assert_eq;

    fn transcript<F>(target: &str, body: F) -> String
    where
        F: FnOnce(&mut TestLog<&mut Vec<u8>>),
    {
        let mut buffer: Vec<u8> = Vec::new();

        {
            let mut log = TestLog::new(&mut buffer, target).expect("Failed to write log header");

            body(&mut log);

            log.end_session().expect("Failed to end session");
        }

        String::from_utf8(buffer).expect("log output should be UTF-8")
    }

    #[test]
    fn session_wraps_cases_with_markers() {
        let text = transcript("default", |log| {
            log.begin_case("vkcts.info.instance_version")
                .expect("Failed to begin case");
            log.message("instance version 1.2")
                .expect("Failed to write message");
            log.end_case(&TestStatus::pass("Version check passed"))
                .expect("Failed to end case");
        });

        let expected = format!(
            "#sessionInfo releaseName {}\n\
             #sessionInfo targetName \"default\"\n\
             #beginSession\n\
             #beginTestCaseResult vkcts.info.instance_version\n\
             <?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <TestCaseResult Version=\"0.3.4\" CasePath=\"vkcts.info.instance_version\" \
             CaseType=\"SelfValidate\">\n \
             <Text>instance version 1.2</Text>\n \
             <Result StatusCode=\"Pass\">Version check passed</Result>\n\
             </TestCaseResult>\n\
             #endTestCaseResult\n\
             #endSession\n",
            vkcts::RELEASE_NAME
        );

        assert_eq!(text, expected);
    }

    #[test]
    fn markup_characters_are_escaped() {
        let text = transcript("default", |log| {
            log.begin_case("vkcts.sample").expect("Failed to begin case");
            log.message("a < b & c > d").expect("Failed to write message");
            log.end_case(&TestStatus::fail("left < right"))
                .expect("Failed to end case");
        });

        assert!(text.contains(" <Text>a &lt; b &amp; c &gt; d</Text>\n"));
        assert!(text.contains(" <Result StatusCode=\"Fail\">left &lt; right</Result>\n"));
    }

    #[test]
    fn every_status_code_is_spelled_out() {
        let text = transcript("default", |log| {
            for (path, status) in [
                ("vkcts.a", TestStatus::pass("ok")),
                ("vkcts.b", TestStatus::fail("bad")),
                ("vkcts.c", TestStatus::not_supported("missing")),
                ("vkcts.d", TestStatus::quality_warning("slow")),
            ] {
                log.begin_case(path).expect("Failed to begin case");
                log.end_case(&status).expect("Failed to end case");
            }
        });

        assert!(text.contains("StatusCode=\"Pass\""));
        assert!(text.contains("StatusCode=\"Fail\""));
        assert!(text.contains("StatusCode=\"NotSupported\""));
        assert!(text.contains("StatusCode=\"QualityWarning\""));
    }

    #[test]
    fn target_name_lands_in_the_header() {
        let text = transcript("headless", |_| {});

        assert!(text.contains("#sessionInfo targetName \"headless\"\n"));
    }
}
