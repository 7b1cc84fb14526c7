//! End-to-end tests for the packaging pipeline with a fake toolchain

#[cfg(test)]
mod tests {
    use apkpipe_builder::actions::{ApkBuilderArgs, ObfuscateArgs, PreprocessArgs, SplitZipArgs};
    use apkpipe_builder::*;
    use apkpipe_errors::Error;
    use apkpipe_hash::Hash;
    use apkpipe_types::{BuildTarget, DexSplitMode};
    use async_trait::async_trait;
    use std::io::{Read, Write};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipArchive, ZipWriter};

    const LARGE_DEX: usize = 3 << 19; // 1.5 MiB

    fn write(path: &Path, bytes: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    /// Stands in for every external tool, writing plausible outputs.
    #[derive(Default)]
    struct FakeToolchain {
        calls: Mutex<Vec<String>>,
        secondary_units: usize,
        fail_tool: Option<&'static str>,
        apk_zip_files: Mutex<Vec<PathBuf>>,
    }

    impl FakeToolchain {
        fn with_secondary_units(units: usize) -> Self {
            Self {
                secondary_units: units,
                ..Self::default()
            }
        }

        fn record(&self, tool: &str) -> Result<(), Error> {
            self.calls.lock().unwrap().push(tool.to_string());
            if self.fail_tool == Some(tool) {
                return Err(apkpipe_errors::BuildError::ToolFailed {
                    tool: tool.to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "simulated failure".to_string(),
                }
                .into());
            }
            Ok(())
        }

        fn count(&self, tool: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| *c == tool).count()
        }
    }

    #[async_trait]
    impl Toolchain for FakeToolchain {
        async fn run_preprocess(&self, args: &PreprocessArgs) -> Result<(), Error> {
            self.record("preprocess")?;
            for entry in walkdir::WalkDir::new(&args.in_dir).min_depth(1).follow_links(true) {
                let entry = entry.unwrap();
                if entry.file_type().is_file() {
                    let relative = entry.path().strip_prefix(&args.in_dir).unwrap();
                    write(&args.out_dir.join(relative), &std::fs::read(entry.path()).unwrap());
                }
            }
            Ok(())
        }

        async fn generate_proguard_config(
            &self,
            _manifest: &Path,
            _resource_dirs: &[PathBuf],
            output: &Path,
        ) -> Result<(), Error> {
            self.record("aapt")?;
            write(output, b"-keep class com.example.MainActivity\n");
            Ok(())
        }

        async fn obfuscate(&self, args: &ObfuscateArgs) -> Result<(), Error> {
            self.record("proguard")?;
            for (input, output) in args.mapping.iter() {
                write(output, &std::fs::read(input).unwrap());
            }
            write(&args.configuration_txt(), b"-dontwarn\n");
            write(&args.mapping_txt(), b"com.example.A -> a:\n");
            Ok(())
        }

        async fn split_zip(&self, args: &SplitZipArgs) -> Result<(), Error> {
            self.record("split_zip")?;
            write(&args.primary_jar, b"primary");
            let mut metadata = String::new();
            for n in 1..=self.secondary_units {
                let jar = args
                    .secondary_zip_dir
                    .join(args.secondary_pattern.replace("%d", &n.to_string()));
                write(&jar, format!("secondary {n}").as_bytes());
                metadata.push_str(&format!(
                    "secondary-{n}.dex.jar {} secondary.dex{n:02}.Canary\n",
                    Hash::from_data(n.to_string().as_bytes()).to_hex()
                ));
            }
            write(&args.secondary_meta, metadata.as_bytes());
            Ok(())
        }

        async fn dex(&self, output: &Path, _inputs: &[PathBuf], _optimize: bool) -> Result<(), Error> {
            self.record("dx")?;
            let is_secondary = output
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with("secondary-"));
            if is_secondary {
                write(output, &vec![0u8; LARGE_DEX]);
            } else {
                write(output, b"dex\n035\0");
            }
            Ok(())
        }

        async fn compress_xz(&self, path: &Path) -> Result<(), Error> {
            self.record("xz")?;
            let mut compressed = path.as_os_str().to_owned();
            compressed.push(".xz");
            std::fs::rename(path, compressed).unwrap();
            Ok(())
        }

        async fn build_apk(
            &self,
            args: &ApkBuilderArgs,
            credentials: &SigningCredentials,
        ) -> Result<(), Error> {
            self.record("apkbuilder")?;
            assert_eq!(credentials.alias, "androiddebugkey");
            self.apk_zip_files.lock().unwrap().extend(args.zip_files.iter().cloned());

            let mut writer = ZipWriter::new(std::fs::File::create(&args.output).unwrap());
            let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            writer.start_file("resources.arsc", stored).unwrap();
            writer.write_all(&[1u8; 8192]).unwrap();
            writer.start_file("classes.dex", stored).unwrap();
            writer.write_all(&std::fs::read(&args.primary_dex).unwrap()).unwrap();
            writer.finish().unwrap();
            Ok(())
        }

        async fn zipalign(&self, input: &Path, output: &Path) -> Result<(), Error> {
            self.record("zipalign")?;
            std::fs::copy(input, output).unwrap();
            Ok(())
        }
    }

    struct Project {
        temp: TempDir,
    }

    impl Project {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let root = temp.path();
            write(&root.join("apps/sample/AndroidManifest.xml"), b"<manifest/>");
            write(&root.join("keystores/debug.keystore"), b"keystore");
            write(
                &root.join("keystores/debug.keystore.properties"),
                b"key.store=debug.keystore\nkey.alias=androiddebugkey\nkey.store.password=android\nkey.alias.password=android\n",
            );
            write(&root.join("java/a.jar"), b"classes a");
            write(&root.join("java/b.jar"), b"classes b");
            write(&root.join("gen/app.resources.apk"), b"resources");
            Self { temp }
        }

        fn root(&self) -> &Path {
            self.temp.path()
        }

        fn builder(&self) -> PackagingConfigurationBuilder {
            PackagingConfiguration::builder(BuildTarget::new("apps/sample", "app"))
                .manifest("apps/sample/AndroidManifest.xml")
                .platform_target("android-16")
                .keystore(Keystore {
                    target: BuildTarget::new("keystores", "debug"),
                    store: PathBuf::from("keystores/debug.keystore"),
                    properties: PathBuf::from("keystores/debug.keystore.properties"),
                })
        }

        fn closure(&self) -> DependencyClosure {
            DependencyClosure {
                classpath_entries_to_dex: vec![PathBuf::from("java/a.jar"), PathBuf::from("java/b.jar")],
                ..DependencyClosure::default()
            }
        }

        fn collaborators(&self, closure: DependencyClosure) -> Collaborators {
            Collaborators::new(
                Arc::new(StaticCollector::new(closure)),
                PackagedResources {
                    resource_apk: PathBuf::from("gen/app.resources.apk"),
                    android_manifest: PathBuf::from("apps/sample/AndroidManifest.xml"),
                    string_assets_zip: None,
                },
            )
        }

        fn rule(&self, config: PackagingConfiguration, closure: DependencyClosure) -> PackagingRule {
            PackagingRule::new(config, self.collaborators(closure), OutputLayout::default()).unwrap()
        }

        fn runner(&self, toolchain: Arc<FakeToolchain>) -> ActionRunner {
            ActionRunner::new(self.root(), toolchain).with_dex_threads(2)
        }
    }

    fn short_names(actions: &[Action]) -> Vec<&'static str> {
        actions.iter().map(Action::short_name).collect()
    }

    fn split_mode() -> DexSplitMode {
        DexSplitMode {
            should_split_dex: true,
            ..DexSplitMode::no_split()
        }
    }

    #[tokio::test]
    async fn test_release_split_build_stores_secondary_dexes() {
        let project = Project::new();
        let config = project
            .builder()
            .package_type(Some("release"))
            .unwrap()
            .dex_split_mode(split_mode())
            .build()
            .unwrap();
        let rule = project.rule(config, project.closure());
        let mut context = BuildableContext::new();
        let actions = rule.build_actions(&mut context).unwrap();

        assert_eq!(
            short_names(&actions),
            vec![
                "make_clean_dir",
                "generate_proguard_config",
                "proguard_obfuscation",
                "mkdir",
                "make_clean_dir",
                "make_clean_dir",
                "make_clean_dir",
                "make_clean_dir",
                "split_zip",
                "mkdir",
                "mkdir",
                "smart_dex",
                "zip_dir_max_deflate",
                "zip_dir_max_deflate",
                "mkdir",
                "apk_builder",
                "zipalign",
                "echo",
            ]
        );

        let toolchain = Arc::new(FakeToolchain::with_secondary_units(3));
        let summary = project.runner(toolchain.clone()).run("//apps/sample:app", &actions).await.unwrap();
        assert_eq!(summary.actions, actions.len());
        assert_eq!(summary.dexed, 4);

        let bin = project.root().join("buck-out/bin/apps/sample");
        let metadata = std::fs::read_to_string(bin.join(
            "__app_split_zip__/secondary_meta/assets/secondary-program-dex-jars/metadata.txt",
        ))
        .unwrap();
        assert_eq!(metadata.lines().count(), 3);

        let zip = std::fs::File::open(bin.join("__app_secondary_dex__.zip")).unwrap();
        let mut archive = ZipArchive::new(zip).unwrap();
        assert_eq!(archive.len(), 3);
        for i in 0..archive.len() {
            let entry = archive.by_index(i).unwrap();
            assert!(entry.name().starts_with("assets/secondary-program-dex-jars/secondary-"));
            assert_eq!(entry.compression(), CompressionMethod::Stored);
        }

        let zips = toolchain.apk_zip_files.lock().unwrap().clone();
        assert_eq!(zips.len(), 2);
        assert!(project.root().join(rule.apk_path()).is_file());
        assert!(context
            .artifacts()
            .iter()
            .any(|p| p.ends_with("mapping.txt")));
    }

    #[tokio::test]
    async fn test_debug_unsplit_build_dexes_once_then_caches() {
        let project = Project::new();
        let rule = project.rule(project.builder().build().unwrap(), project.closure());
        let mut context = BuildableContext::new();
        let actions = rule.build_actions(&mut context).unwrap();

        assert_eq!(
            short_names(&actions),
            vec!["mkdir", "mkdir", "smart_dex", "mkdir", "apk_builder", "zipalign", "echo"]
        );
        let apk = context.artifacts().last().unwrap().clone();
        assert!(apk.to_string_lossy().ends_with("app.apk"));
        assert_eq!(apk, rule.apk_path());

        let toolchain = Arc::new(FakeToolchain::default());
        let runner = project.runner(toolchain.clone());
        runner.run("//apps/sample:app", &actions).await.unwrap();
        let second = runner.run("//apps/sample:app", &actions).await.unwrap();

        assert_eq!(toolchain.count("dx"), 1);
        assert_eq!(second.dex_cached, 1);
        assert_eq!(second.dexed, 0);

        write(&project.root().join("java/b.jar"), b"classes b, edited");
        let third = runner.run("//apps/sample:app", &actions).await.unwrap();
        assert_eq!(third.dexed, 1);
    }

    #[tokio::test]
    async fn test_native_filter_copies_only_present_abis() {
        let project = Project::new();
        write(&project.root().join("native/libs/armeabi/libfoo.so"), b"elf");
        write(&project.root().join("native/libs/mips/libfoo.so"), b"elf");

        let config = project
            .builder()
            .cpu_filter("arm")
            .unwrap()
            .cpu_filter("x86")
            .unwrap()
            .build()
            .unwrap();
        let closure = DependencyClosure {
            native_lib_dirs: vec![PathBuf::from("native/libs")],
            ..project.closure()
        };
        let rule = project.rule(config, closure);
        let actions = rule.build_actions(&mut BuildableContext::new()).unwrap();

        project
            .runner(Arc::new(FakeToolchain::default()))
            .run("//apps/sample:app", &actions)
            .await
            .unwrap();

        let lib = project.root().join("buck-out/bin/apps/sample/__native_libs_app__/lib");
        let mut abis: Vec<String> = std::fs::read_dir(&lib)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        abis.sort();
        assert_eq!(abis, vec!["armeabi".to_string()]);
    }

    #[tokio::test]
    async fn test_resource_compression_repacks_table() {
        let project = Project::new();
        let config = project
            .builder()
            .resource_compression_mode("enabled")
            .unwrap()
            .build()
            .unwrap();
        let rule = project.rule(config, project.closure());
        let actions = rule.build_actions(&mut BuildableContext::new()).unwrap();
        assert!(actions.contains(&Action::Zipalign {
            input: rule.compressed_apk_path(),
            output: rule.apk_path(),
        }));

        let (tx, mut rx) = apkpipe_events::channel();
        project
            .runner(Arc::new(FakeToolchain::default()))
            .with_event_sender(tx)
            .run("//apps/sample:app", &actions)
            .await
            .unwrap();

        let mut completed = None;
        while let Ok(event) = rx.try_recv() {
            if let apkpipe_events::AppEvent::Packaging(
                apkpipe_events::PackagingEvent::PipelineCompleted { apk_path, .. },
            ) = event
            {
                completed = Some(apk_path);
            }
        }
        assert_eq!(completed, Some(project.root().join(rule.apk_path())));

        let apk = std::fs::File::open(project.root().join(rule.apk_path())).unwrap();
        let mut archive = ZipArchive::new(apk).unwrap();
        let mut table = archive.by_name("resources.arsc").unwrap();
        assert_eq!(table.compression(), CompressionMethod::Deflated);
        let mut contents = Vec::new();
        table.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, vec![1u8; 8192]);
    }

    #[tokio::test]
    async fn test_preprocess_rebinds_classpath() {
        let project = Project::new();
        let config = project.builder().preprocess_command("cp -r . \"$OUT_JARS_DIR\"").build().unwrap();
        let rule = project.rule(config, project.closure());
        let actions = rule.build_actions(&mut BuildableContext::new()).unwrap();

        let smart_dex = actions
            .iter()
            .find_map(|a| match a {
                Action::SmartDex(args) => Some(args.clone()),
                _ => None,
            })
            .unwrap();
        let out = PathBuf::from("buck-out/bin/apps/sample/java_classes_preprocess_out_app");
        assert_eq!(smart_dex.primary_output, rule.primary_dex_path());
        assert_eq!(
            smart_dex.primary_inputs,
            vec![out.join("java/a.jar"), out.join("java/b.jar")]
        );

        let toolchain = Arc::new(FakeToolchain::default());
        project.runner(toolchain.clone()).run("//apps/sample:app", &actions).await.unwrap();
        assert_eq!(toolchain.count("preprocess"), 1);
        assert!(project.root().join(out.join("java/a.jar")).is_file());
    }

    #[tokio::test]
    async fn test_tool_failure_carries_action_description() {
        let project = Project::new();
        let rule = project.rule(project.builder().build().unwrap(), project.closure());
        let actions = rule.build_actions(&mut BuildableContext::new()).unwrap();

        let toolchain = Arc::new(FakeToolchain {
            fail_tool: Some("zipalign"),
            ..FakeToolchain::default()
        });
        let (tx, mut rx) = apkpipe_events::channel();
        let err = project
            .runner(toolchain)
            .with_event_sender(tx)
            .run("//apps/sample:app", &actions)
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("zipalign -f 4"));
        assert!(message.contains("simulated failure"));

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            if let apkpipe_events::AppEvent::Packaging(
                apkpipe_events::PackagingEvent::ActionFailed { action, .. },
            ) = event
            {
                assert_eq!(action, "zipalign");
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_cache_key_follows_exopackage() {
        let project = Project::new();
        let rule = project.rule(project.builder().build().unwrap(), project.closure());
        let key = rule.abi_key_for_deps(project.root()).await.unwrap();
        assert_eq!(key, CacheKey::RuleKey(rule.rule_key(project.root()).await.unwrap()));

        let merge = Arc::new(StaticPreDexMerge {
            secondary_dex_directories: vec![],
            metadata_txt: PathBuf::from("pre/metadata.txt"),
            dex_directory: PathBuf::from("pre/dex"),
        });
        let config = project.builder().exopackage(true).build().unwrap();

        let missing_abi = PackagingRule::new(
            config.clone(),
            project.collaborators(project.closure()).with_pre_dex_merge(merge.clone()),
            OutputLayout::default(),
        )
        .unwrap_err();
        assert!(missing_abi.is_configuration_error());

        let collector = Arc::new(StaticCollector::new(project.closure()));
        let abi = Arc::new(ContentAbiCalculator::new(project.root(), collector));
        let exo = PackagingRule::new(
            config,
            project
                .collaborators(project.closure())
                .with_pre_dex_merge(merge)
                .with_deps_abi(abi.clone()),
            OutputLayout::default(),
        )
        .unwrap();
        let key = exo.abi_key_for_deps(project.root()).await.unwrap();
        assert_eq!(key, CacheKey::DepsAbi(abi.android_binary_abi_hash().await.unwrap()));

        let actions = exo.build_actions(&mut BuildableContext::new()).unwrap();
        assert!(!actions.iter().any(|a| matches!(a, Action::SmartDex(_) | Action::ZipDirectoryWithMaxDeflate { .. })));
        assert_eq!(
            exo.exopackage_info(),
            Some(ExopackageInfo {
                metadata: PathBuf::from("pre/metadata.txt"),
                dex_directory: PathBuf::from("pre/dex"),
            })
        );
    }

    #[tokio::test]
    async fn test_rule_key_tracks_manifest_and_configuration() {
        let project = Project::new();
        let debug = project.rule(project.builder().build().unwrap(), project.closure());
        let before = debug.rule_key(project.root()).await.unwrap();
        assert_eq!(before, debug.rule_key(project.root()).await.unwrap());

        let release = project.rule(
            project.builder().package_type(Some("release")).unwrap().build().unwrap(),
            project.closure(),
        );
        assert_ne!(before, release.rule_key(project.root()).await.unwrap());

        write(&project.root().join("apps/sample/AndroidManifest.xml"), b"<manifest package=\"x\"/>");
        assert_ne!(before, debug.rule_key(project.root()).await.unwrap());
    }

    #[tokio::test]
    async fn test_rule_key_tracks_packaged_file_contents() {
        let project = Project::new();
        let rule = project.rule(project.builder().build().unwrap(), project.closure());
        let mut seen = vec![rule.rule_key(project.root()).await.unwrap()];

        for (path, contents) in [
            ("java/b.jar", &b"classes b, edited"[..]),
            ("gen/app.resources.apk", &b"resources, edited"[..]),
            ("keystores/debug.keystore", &b"keystore, rotated"[..]),
        ] {
            write(&project.root().join(path), contents);
            let key = rule.rule_key(project.root()).await.unwrap();
            assert!(!seen.contains(&key), "rule key ignored an edit to {path}");
            seen.push(key);
        }

        let no_pre_dex = project.rule(
            project.builder().disable_pre_dex(true).build().unwrap(),
            project.closure(),
        );
        let key = no_pre_dex.rule_key(project.root()).await.unwrap();
        assert!(!seen.contains(&key));
    }

    #[test]
    fn test_string_assets_packed_only_when_stored_as_assets() {
        let project = Project::new();
        let collaborators = |closure| {
            let mut collaborators = project.collaborators(closure);
            collaborators.resources.string_assets_zip = Some(PathBuf::from("gen/app.strings.zip"));
            collaborators
        };
        let zip_files = |mode: &str| {
            let config = project.builder().resource_compression_mode(mode).unwrap().build().unwrap();
            let rule =
                PackagingRule::new(config, collaborators(project.closure()), OutputLayout::default())
                    .unwrap();
            rule.build_actions(&mut BuildableContext::new())
                .unwrap()
                .into_iter()
                .find_map(|a| match a {
                    Action::BuildApk(args) => Some(args.zip_files),
                    _ => None,
                })
                .unwrap()
        };

        assert!(zip_files("enabled").is_empty());
        assert_eq!(
            zip_files("enabled_with_strings_as_assets"),
            vec![PathBuf::from("gen/app.strings.zip")]
        );
    }

    #[test]
    fn test_pre_dexed_build_zips_merge_directories() {
        let project = Project::new();
        let merge = Arc::new(StaticPreDexMerge {
            secondary_dex_directories: vec![PathBuf::from("buck-out/bin/pre/secondary")],
            metadata_txt: PathBuf::from("pre/metadata.txt"),
            dex_directory: PathBuf::from("pre/dex"),
        });
        let rule = PackagingRule::new(
            project.builder().build().unwrap(),
            project.collaborators(project.closure()).with_pre_dex_merge(merge),
            OutputLayout::default(),
        )
        .unwrap();
        let actions = rule.build_actions(&mut BuildableContext::new()).unwrap();
        assert_eq!(
            short_names(&actions),
            vec!["zip_dir_max_deflate", "mkdir", "apk_builder", "zipalign", "echo"]
        );
        assert!(actions.contains(&Action::ZipDirectoryWithMaxDeflate {
            source: PathBuf::from("buck-out/bin/pre/secondary"),
            zip: PathBuf::from("buck-out/bin/pre/secondary.zip"),
            max_deflate_size: 1 << 20,
        }));
    }

    #[test]
    fn test_absolute_classpath_entry_fails_under_obfuscation() {
        let project = Project::new();
        let config = project.builder().package_type(Some("release")).unwrap().build().unwrap();
        let closure = DependencyClosure {
            classpath_entries_to_dex: vec![PathBuf::from("/abs/lib.jar")],
            ..DependencyClosure::default()
        };
        let err = project
            .rule(config, closure)
            .build_actions(&mut BuildableContext::new())
            .unwrap_err();
        assert!(err.to_string().contains("/abs/lib.jar"));
    }
}
