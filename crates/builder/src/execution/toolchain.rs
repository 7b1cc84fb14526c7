//! External tools behind one trait
//!
//! The runner hands every method absolute paths.

use super::command::ToolCommand;
use super::keystore::SigningCredentials;
use crate::actions::{ApkBuilderArgs, ObfuscateArgs, PreprocessArgs, SplitZipArgs};
use apkpipe_config::ToolsConfig;
use apkpipe_errors::{ConfigError, Error};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const STORE_PASSWORD_VAR: &str = "APKPIPE_KS_PASS";
const KEY_PASSWORD_VAR: &str = "APKPIPE_KEY_PASS";

/// The tools the packaging pipeline drives.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Run the preprocess command in `args.in_dir`.
    async fn run_preprocess(&self, args: &PreprocessArgs) -> Result<(), Error>;

    /// Write keep rules derived from the manifest and resources to `output`.
    async fn generate_proguard_config(
        &self,
        manifest: &Path,
        resource_dirs: &[PathBuf],
        output: &Path,
    ) -> Result<(), Error>;

    async fn obfuscate(&self, args: &ObfuscateArgs) -> Result<(), Error>;

    /// Write the primary jar, `secondary-N.jar` files and `metadata.txt`.
    async fn split_zip(&self, args: &SplitZipArgs) -> Result<(), Error>;

    /// Dex `inputs` into `output`, a `classes.dex` or a `.dex.jar`.
    async fn dex(&self, output: &Path, inputs: &[PathBuf], optimize: bool) -> Result<(), Error>;

    /// Compress `path` to `path.xz`, removing `path`.
    async fn compress_xz(&self, path: &Path) -> Result<(), Error>;

    /// Build and sign the package at `args.output`.
    async fn build_apk(
        &self,
        args: &ApkBuilderArgs,
        credentials: &SigningCredentials,
    ) -> Result<(), Error>;

    async fn zipalign(&self, input: &Path, output: &Path) -> Result<(), Error>;
}

/// Runs the configured tools as child processes.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    tools: ToolsConfig,
    project_root: PathBuf,
}

impl CommandToolchain {
    #[must_use]
    pub fn new(tools: ToolsConfig, project_root: impl Into<PathBuf>) -> Self {
        Self {
            tools,
            project_root: project_root.into(),
        }
    }

    fn bootclasspath(&self) -> Vec<PathBuf> {
        self.tools
            .bootclasspath
            .iter()
            .map(|p| crate::actions::resolve(&self.project_root, p))
            .collect()
    }

    fn proguard_jar(&self) -> Result<&Path, Error> {
        self.tools.proguard_jar.as_deref().ok_or_else(|| {
            ConfigError::MissingField {
                field: "tools.proguard_jar".to_string(),
            }
            .into()
        })
    }

    /// The SDK's stock proguard rules, when an SDK is configured.
    fn android_proguard_config(&self, optimize: bool) -> Option<PathBuf> {
        let name = if optimize {
            "proguard-android-optimize.txt"
        } else {
            "proguard-android.txt"
        };
        self.tools
            .android_sdk
            .as_ref()
            .map(|sdk| sdk.join("tools").join("proguard").join(name))
    }

    fn dex_command(&self, output: &Path, inputs: &[PathBuf], optimize: bool) -> ToolCommand {
        let mut command = ToolCommand::new("dx", &self.tools.dx);
        command.arg("--dex");
        if !optimize {
            command.arg("--no-optimize");
        }
        let mut out_flag = OsString::from("--output=");
        out_flag.push(output);
        command.arg(out_flag).args(inputs.iter().cloned());
        command
    }

    /// v1-only signing. Passwords reach the signer through its environment,
    /// never its argument list.
    fn sign_command(
        &self,
        credentials: &SigningCredentials,
        unsigned: &Path,
        signed: &Path,
    ) -> ToolCommand {
        let mut signer = ToolCommand::new("apksigner", &self.tools.apksigner);
        signer
            .env(STORE_PASSWORD_VAR, &credentials.store_password)
            .env(KEY_PASSWORD_VAR, &credentials.alias_password)
            .arg("sign")
            .flag("--ks", &credentials.keystore)
            .flag("--ks-pass", format!("env:{STORE_PASSWORD_VAR}"))
            .flag("--ks-key-alias", &credentials.alias)
            .flag("--key-pass", format!("env:{KEY_PASSWORD_VAR}"))
            .flag("--v1-signing-enabled", "true")
            .flag("--v2-signing-enabled", "false")
            .flag("--out", signed)
            .arg(unsigned);
        signer
    }
}

fn join_paths(paths: &[PathBuf]) -> OsString {
    let mut joined = OsString::new();
    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            joined.push(":");
        }
        joined.push(path);
    }
    joined
}

/// `<name>.signed.apk` is signed from `<name>.unsigned.apk`.
fn unsigned_sibling(signed: &Path) -> PathBuf {
    let text = signed.to_string_lossy();
    match text.strip_suffix(".signed.apk") {
        Some(stem) => PathBuf::from(format!("{stem}.unsigned.apk")),
        None => PathBuf::from(format!("{text}.unsigned")),
    }
}

#[async_trait]
impl Toolchain for CommandToolchain {
    async fn run_preprocess(&self, args: &PreprocessArgs) -> Result<(), Error> {
        let mut command = ToolCommand::new("preprocess_java_classes", "bash");
        command
            .arg("-c")
            .arg(&args.command)
            .current_dir(&args.in_dir)
            .env("IN_JARS_DIR", &args.in_dir)
            .env("OUT_JARS_DIR", &args.out_dir);
        let bootclasspath = self.bootclasspath();
        if !bootclasspath.is_empty() {
            command.env("ANDROID_BOOTCLASSPATH", join_paths(&bootclasspath));
        }
        command.run().await.map(|_| ())
    }

    async fn generate_proguard_config(
        &self,
        manifest: &Path,
        resource_dirs: &[PathBuf],
        output: &Path,
    ) -> Result<(), Error> {
        let mut command = ToolCommand::new("aapt", &self.tools.aapt);
        command
            .args(["package", "-f", "--auto-add-overlay"])
            .flag("-G", output)
            .flag("-M", manifest);
        for dir in resource_dirs {
            command.flag("-S", dir);
        }
        if let Some(android_jar) = self.bootclasspath().first() {
            command.flag("-I", android_jar);
        }
        command.run().await.map(|_| ())
    }

    async fn obfuscate(&self, args: &ObfuscateArgs) -> Result<(), Error> {
        let mut command = ToolCommand::new("proguard", &self.tools.java);
        command.flag("-jar", self.proguard_jar()?);

        if let Some(stock) = self.android_proguard_config(args.use_android_config_with_optimizations) {
            command.flag("-include", stock);
        }
        command.flag("-include", &args.generated_config);
        for config in &args.configs {
            command.flag("-include", config);
        }
        if let Some(passes) = args.optimization_passes {
            command.flag("-optimizationpasses", passes.to_string());
        }
        for (input, output) in args.mapping.iter() {
            command.flag("-injars", input).flag("-outjars", output);
        }

        let mut library_jars = self.bootclasspath();
        library_jars.extend(args.library_jars.iter().cloned());
        if !library_jars.is_empty() {
            command.flag("-libraryjars", join_paths(&library_jars));
        }
        command
            .flag("-printmapping", args.mapping_txt())
            .flag("-printconfiguration", args.configuration_txt());
        command.run().await.map(|_| ())
    }

    async fn split_zip(&self, args: &SplitZipArgs) -> Result<(), Error> {
        let mut command = ToolCommand::new("split_zip", &self.tools.splitter);
        for input in &args.inputs {
            command.flag("--input", input);
        }
        command
            .flag("--secondary-meta", &args.secondary_meta)
            .flag("--primary-jar", &args.primary_jar)
            .flag("--secondary-dir", &args.secondary_zip_dir)
            .flag("--secondary-pattern", &args.secondary_pattern)
            .flag("--strategy", args.strategy.as_str())
            .flag("--dex-store", args.dex_store.as_str())
            .flag("--report-dir", &args.report_dir);
        if let Some(config) = &args.proguard_full_config {
            command.flag("--proguard-config", config);
        }
        if let Some(mapping) = &args.proguard_mapping {
            command.flag("--proguard-mapping", mapping);
        }
        for pattern in &args.primary_dex_patterns {
            command.flag("--primary-pattern", pattern);
        }
        if let Some(classes) = &args.primary_dex_classes_file {
            command.flag("--primary-classes", classes);
        }
        if let Some(scenario) = &args.primary_dex_scenario_file {
            command.flag("--primary-scenario", scenario);
            if args.scenario_overflow_allowed {
                command.arg("--allow-scenario-overflow");
            }
        }
        if args.use_linear_alloc_split_dex {
            command.flag(
                "--linear-alloc-limit",
                args.linear_alloc_hard_limit.to_string(),
            );
        }
        command.run().await.map(|_| ())
    }

    async fn dex(&self, output: &Path, inputs: &[PathBuf], optimize: bool) -> Result<(), Error> {
        self.dex_command(output, inputs, optimize)
            .run()
            .await
            .map(|_| ())
    }

    async fn compress_xz(&self, path: &Path) -> Result<(), Error> {
        let mut command = ToolCommand::new("xz", &self.tools.xz);
        command.args(["-z", "-9", "-f"]).arg(path);
        command.run().await.map(|_| ())
    }

    async fn build_apk(
        &self,
        args: &ApkBuilderArgs,
        credentials: &SigningCredentials,
    ) -> Result<(), Error> {
        let unsigned = unsigned_sibling(&args.output);

        let mut builder = ToolCommand::new("apkbuilder", &self.tools.apkbuilder);
        builder
            .arg(&unsigned)
            .arg("-u")
            .flag("-z", &args.resource_apk)
            .flag("-f", &args.primary_dex);
        for zip in &args.zip_files {
            builder.flag("-z", zip);
        }
        for jar in &args.third_party_jars {
            builder.flag("-rj", jar);
        }
        for dir in &args.native_library_dirs {
            builder.flag("-nf", dir);
        }
        builder.run().await?;

        self.sign_command(credentials, &unsigned, &args.output)
            .run()
            .await
            .map(|_| ())
    }

    async fn zipalign(&self, input: &Path, output: &Path) -> Result<(), Error> {
        let mut command = ToolCommand::new("zipalign", &self.tools.zipalign);
        command.args(["-f", "4"]).arg(input).arg(output);
        command.run().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_sibling() {
        assert_eq!(
            unsigned_sibling(Path::new("gen/app.signed.apk")),
            PathBuf::from("gen/app.unsigned.apk")
        );
        assert_eq!(
            unsigned_sibling(Path::new("out.apk")),
            PathBuf::from("out.apk.unsigned")
        );
    }

    #[test]
    fn test_android_config_follows_optimization_toggle() {
        let tools = ToolsConfig {
            android_sdk: Some(PathBuf::from("/sdk")),
            ..ToolsConfig::default()
        };
        let toolchain = CommandToolchain::new(tools, "/project");
        assert_eq!(
            toolchain.android_proguard_config(true),
            Some(PathBuf::from("/sdk/tools/proguard/proguard-android-optimize.txt"))
        );
        assert_eq!(
            toolchain.android_proguard_config(false),
            Some(PathBuf::from("/sdk/tools/proguard/proguard-android.txt"))
        );
    }

    #[test]
    fn test_signing_passwords_stay_off_the_command_line() {
        let toolchain = CommandToolchain::new(ToolsConfig::default(), "/project");
        let credentials = SigningCredentials {
            keystore: PathBuf::from("/project/debug.keystore"),
            store_password: "s3cret".to_string(),
            alias: "androiddebugkey".to_string(),
            alias_password: "k3y".to_string(),
        };
        let command = toolchain.sign_command(
            &credentials,
            Path::new("/out/app.unsigned.apk"),
            Path::new("/out/app.signed.apk"),
        );

        let argv: Vec<String> = command
            .argv()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert!(argv.iter().all(|arg| !arg.contains("s3cret") && !arg.contains("k3y")));
        assert!(argv.contains(&"env:APKPIPE_KS_PASS".to_string()));
        assert!(argv.contains(&"env:APKPIPE_KEY_PASS".to_string()));
        assert!(command
            .environment()
            .contains(&("APKPIPE_KS_PASS".to_string(), OsString::from("s3cret"))));
        assert!(!format!("{command:?}").contains("s3cret"));
    }

    #[test]
    fn test_dex_command_line() {
        let toolchain = CommandToolchain::new(ToolsConfig::default(), "/project");
        let inputs = [PathBuf::from("out/a.jar"), PathBuf::from("out/b.jar")];
        let command = toolchain.dex_command(Path::new("gen/classes.dex"), &inputs, false);

        assert_eq!(
            command.argv(),
            [
                OsString::from("--dex"),
                OsString::from("--no-optimize"),
                OsString::from("--output=gen/classes.dex"),
                OsString::from("out/a.jar"),
                OsString::from("out/b.jar"),
            ]
        );
        let optimized = toolchain.dex_command(Path::new("gen/classes.dex"), &inputs, true);
        assert_eq!(optimized.argv().len(), 4);
    }

    #[test]
    fn test_bootclasspath_is_absolutized() {
        let tools = ToolsConfig {
            bootclasspath: vec![PathBuf::from("sdk/android.jar"), PathBuf::from("/abs/extra.jar")],
            ..ToolsConfig::default()
        };
        let toolchain = CommandToolchain::new(tools, "/project");
        assert_eq!(
            join_paths(&toolchain.bootclasspath()),
            OsString::from("/project/sdk/android.jar:/abs/extra.jar")
        );
    }
}
