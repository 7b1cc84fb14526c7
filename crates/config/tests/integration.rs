//! Integration tests for config

#[cfg(test)]
mod tests {
    use apkpipe_config::*;
    use apkpipe_types::OutputFormat;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Env var tests must not run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
default_output = "json"
out_dir = "out"

[tools]
proguard_jar = "/sdk/tools/proguard/lib/proguard.jar"
bootclasspath = ["/sdk/platforms/android-21/android.jar"]

[dex]
threads = 6
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.general.default_output, OutputFormat::Json);
        assert_eq!(config.general.out_dir, PathBuf::from("out"));
        assert_eq!(
            config.tools.proguard_jar.as_deref(),
            Some(Path::new("/sdk/tools/proguard/lib/proguard.jar"))
        );
        assert_eq!(config.tools.bootclasspath.len(), 1);
        assert_eq!(config.dex.threads, 6);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = Config::load_from_file(Path::new("/no/such/apkpipe.toml"))
            .await
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::set_var("APKPIPE_DEX_THREADS", "3");
        std::env::set_var("APKPIPE_OUT_DIR", "custom-out");
        let mut config = Config::default();
        config.merge_env().unwrap();
        assert_eq!(config.dex.threads, 3);
        assert_eq!(config.general.out_dir, PathBuf::from("custom-out"));

        std::env::set_var("APKPIPE_DEX_THREADS", "many");
        let mut config = Config::default();
        assert!(config.merge_env().is_err());

        std::env::remove_var("APKPIPE_DEX_THREADS");
        std::env::remove_var("APKPIPE_OUT_DIR");
    }
}
