#[cfg(test)]
mod driver {
    use vkcts::context::{Context, ContextCfg};
    use vkcts::runner::{self, RunCfg};
    use vkcts::shader;

    use std::path::PathBuf;

    fn temp_log(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn listing_needs_no_device() {
        runner::list(&["vkcts.info.*".to_string()], None).expect("Failed to list cases");
        runner::list(&["*".to_string()], Some("headless")).expect("Failed to list cases");
    }

    #[test]
    fn unknown_display_is_rejected() {
        assert!(runner::list(&["*".to_string()], Some("absent")).is_err());
    }

    #[test]
    #[ignore = "requires a Vulkan driver"]
    fn context_comes_up_with_a_universal_queue() {
        let ctx = Context::new(&ContextCfg::default()).expect("Failed to create context");

        assert!(!ctx.hw().name().is_empty());

        let code = ctx
            .compile(
                "smoke",
                shader::Stage::Compute,
                "#version 450\nlayout(local_size_x = 1) in;\nvoid main() {}\n",
            )
            .expect("Failed to compile a trivial shader");
        assert!(!code.is_empty());

        ctx.device().wait_idle().expect("Failed to wait for idle device");
    }

    #[test]
    #[ignore = "requires a Vulkan driver"]
    fn info_cases_pass_on_any_conformant_device() {
        let log_path = temp_log("vkcts-info-smoke.qpa");

        let cfg = RunCfg {
            patterns: vec!["vkcts.info.*".to_string()],
            log_path: log_path.clone(),
            display: None,
            context: ContextCfg::default(),
        };

        let summary = runner::execute(&cfg).expect("Failed to execute cases");

        assert_eq!(summary.total(), 4);
        assert!(summary.is_ok(), "info cases failed: {:?}", summary);

        let log = std::fs::read_to_string(&log_path).expect("Failed to read result log");
        assert!(log.contains("#beginTestCaseResult vkcts.info.instance_version"));
        assert!(log.contains("#endSession"));

        let _ = std::fs::remove_file(&log_path);
    }

    #[test]
    #[ignore = "requires a Vulkan driver"]
    fn display_contract_cases_pass() {
        let log_path = temp_log("vkcts-wsi-contract.qpa");

        let cfg = RunCfg {
            patterns: vec![
                "vkcts.wsi.display.enumeration".to_string(),
                "vkcts.wsi.display.headless.capability_contract".to_string(),
            ],
            log_path: log_path.clone(),
            display: None,
            context: ContextCfg::default(),
        };

        let summary = runner::execute(&cfg).expect("Failed to execute cases");

        assert_eq!(summary.total(), 2);
        assert!(summary.is_ok(), "contract cases failed: {:?}", summary);

        let _ = std::fs::remove_file(&log_path);
    }
}
