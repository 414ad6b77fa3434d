#[cfg(test)]
mod status {
    use vkcts::display::DisplayError;
    use vkcts::status::{StatusCode, TestError, TestStatus};

    use ash::vk;

    use pretty_assertions::assert_eq;

    #[test]
    fn code_names_match_the_result_log_vocabulary() {
        assert_eq!(StatusCode::Pass.as_str(), "Pass");
        assert_eq!(StatusCode::Fail.as_str(), "Fail");
        assert_eq!(StatusCode::NotSupported.as_str(), "NotSupported");
        assert_eq!(StatusCode::QualityWarning.as_str(), "QualityWarning");

        assert_eq!(StatusCode::Pass.to_string(), "Pass");
    }

    #[test]
    fn only_fail_counts_as_failure() {
        assert!(StatusCode::Fail.is_failure());
        assert!(!StatusCode::Pass.is_failure());
        assert!(!StatusCode::NotSupported.is_failure());
        assert!(!StatusCode::QualityWarning.is_failure());
    }

    #[test]
    fn constructors_keep_code_and_description() {
        let status = TestStatus::fail("Image comparison failed");

        assert_eq!(status.code(), StatusCode::Fail);
        assert_eq!(status.description(), "Image comparison failed");
        assert_eq!(status.to_string(), "Fail (Image comparison failed)");

        let status = TestStatus::not_supported("VK_EXT_mesh_shader is not supported");

        assert_eq!(status.code(), StatusCode::NotSupported);
        assert_eq!(
            status.to_string(),
            "NotSupported (VK_EXT_mesh_shader is not supported)"
        );
    }

    #[test]
    fn error_display_keeps_the_raw_message() {
        let not_supported = TestError::NotSupported("conditionalRendering".to_string());
        assert_eq!(not_supported.to_string(), "conditionalRendering");

        let internal = TestError::Internal("short readback buffer".to_string());
        assert_eq!(internal.to_string(), "short readback buffer");
    }

    #[test]
    fn vulkan_call_errors_name_the_entry_point() {
        let err = TestError::VkCall {
            call: "vkGetQueryPoolResults",
            code: vk::Result::ERROR_DEVICE_LOST,
        };

        let text = err.to_string();

        assert!(text.starts_with("vkGetQueryPoolResults call failed ("));
        assert!(text.ends_with(')'));
    }

    #[test]
    fn display_errors_keep_their_skip_semantics() {
        let skip = TestError::from(DisplayError::NotSupported("platform display attributes"));
        assert!(matches!(skip, TestError::NotSupported(_)));

        let hard = TestError::from(DisplayError::Creating("no windowing stack".to_string()));
        assert!(matches!(hard, TestError::Internal(_)));
    }
}
