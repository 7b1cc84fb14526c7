//! Integration tests for error types

#[cfg(test)]
mod tests {
    use apkpipe_errors::*;

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::InvalidCpuFilter {
            target: "//apps/sample:app".into(),
            value: "sparc".into(),
        };
        let err: Error = config_err.into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_error_display_names_target_and_value() {
        let err = ConfigError::InvalidCompressionMode {
            target: "//apps/sample:app".into(),
            value: "zstd".into(),
        };
        let text = err.to_string();
        assert!(text.contains("//apps/sample:app"));
        assert!(text.contains("zstd"));
    }

    #[test]
    fn test_missing_collaborator_hint_names_collaborator() {
        let missing = |collaborator: &str| ConfigError::MissingCollaborator {
            target: "//apps/sample:app".into(),
            collaborator: collaborator.into(),
        };
        let merge_hint = missing("pre-dex merge").user_hint().unwrap();
        let abi_hint = missing("deps ABI calculator").user_hint().unwrap();
        assert!(merge_hint.contains("pre-dex merge"));
        assert!(abi_hint.contains("dependency ABI calculator"));
    }

    #[test]
    fn test_error_clone() {
        let err = BuildError::ActionFailed {
            action: "zipalign".into(),
            message: "exit status 1".into(),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let err: Error = io_err.into();
        assert!(matches!(
            err,
            Error::Io {
                kind: std::io::ErrorKind::PermissionDenied,
                ..
            }
        ));
        assert_eq!(err.user_code(), Some("error.io"));
    }

    #[test]
    fn test_io_with_path_keeps_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::io_with_path(&io_err, "lib/armeabi");
        match err {
            Error::Io { path, message, .. } => {
                assert_eq!(path.as_deref(), Some(std::path::Path::new("lib/armeabi")));
                assert!(message.starts_with("lib/armeabi"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_user_codes_are_stable() {
        let err: Error = BuildError::ToolFailed {
            tool: "zipalign".into(),
            status: "exit status: 1".into(),
            stderr: String::new(),
        }
        .into();
        assert_eq!(err.user_code(), Some("build.tool_failed"));
        assert!(!err.is_retryable());
    }
}
