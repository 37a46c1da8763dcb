//! Unit tests for pipeline orchestration.

use super::*;
use crate::builder::CROSS_COMPILER_MODULE;
use crate::git::DEFAULT_BRANCH;
use crate::metadata::{
    BuildInfo, BuildTarget, ExtraArtifact, PipelineOptions, PublishingInfo, SigningPolicy,
};
use crate::publish::MockUploader;
use crate::test_utils::{ExpectedCall, StubExecutor, failure_output};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Harness {
    _temp: TempDir,
    workdir: Utf8PathBuf,
    output: Utf8PathBuf,
}

impl Harness {
    fn gopath(&self) -> Utf8PathBuf {
        self.workdir.join("go")
    }

    fn checkout(&self) -> Utf8PathBuf {
        self.gopath().join("src/acme/widget")
    }

    fn gox(&self) -> Utf8PathBuf {
        self.gopath().join("bin/gox")
    }

    fn context<'a>(
        &self,
        executor: &'a StubExecutor,
        uploader: &'a MockUploader,
        user_config: UserConfig,
    ) -> RunContext<'a> {
        RunContext {
            executor,
            uploader,
            branch: DEFAULT_BRANCH.to_owned(),
            workdir: Some(self.workdir.clone()),
            output_dir: self.output.clone(),
            user_config,
            verbose: false,
        }
    }

    /// Clone (leaving a module, a template and `.git`), branch switch,
    /// dependency sync and tests.
    fn prelude(&self) -> Vec<ExpectedCall> {
        let checkout = self.checkout();
        vec![
            ExpectedCall::new("git", ["clone", "git@acme:widget.git", checkout.as_str()])
                .with_env("GOPATH", self.gopath().to_string())
                .creating(checkout.join(".git/HEAD"))
                .creating(checkout.join("go.mod"))
                .creating(checkout.join("install.tmpl")),
            ExpectedCall::new("git", ["checkout", DEFAULT_BRANCH]).in_dir(checkout.clone()),
            ExpectedCall::new("go", ["mod", "download"]).in_dir(checkout.clone()),
            ExpectedCall::new("go", ["test", "-v", "./..."])
                .with_env("GOPATH", self.gopath().to_string())
                .in_dir(checkout),
        ]
    }

    fn build_calls(&self) -> Vec<ExpectedCall> {
        vec![
            ExpectedCall::new("go", ["install", CROSS_COMPILER_MODULE]).creating(self.gox()),
            ExpectedCall::new(self.gox().as_str(), ["-osarch=linux/amd64", "./..."])
                .in_dir(self.checkout())
                .creating(self.checkout().join("widget_linux_amd64")),
        ]
    }

    fn through_build(&self) -> Vec<ExpectedCall> {
        let mut calls = self.prelude();
        calls.extend(self.build_calls());
        calls
    }

    fn staged_binary(&self) -> Utf8PathBuf {
        self.output.join("widget_linux_amd64")
    }
}

#[fixture]
fn harness() -> Harness {
    let temp = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("utf8");
    Harness {
        workdir: root.join("work"),
        output: root.join("out"),
        _temp: temp,
    }
}

fn widget() -> PackageDescriptor {
    PackageDescriptor {
        package: "acme/widget".to_owned(),
        version: "1.0.0".to_owned(),
        description: "A widget".to_owned(),
        build_info: BuildInfo {
            targets: vec![BuildTarget {
                name: "linux/amd64".to_owned(),
                ..BuildTarget::default()
            }],
            extras: Vec::new(),
        },
        ..PackageDescriptor::default()
    }
}

const BUILD_ONLY: StageFlags = StageFlags {
    build: true,
    sign: false,
    publish: false,
};

#[rstest]
fn acme_widget_builds_one_binary(harness: Harness) {
    let executor = StubExecutor::new(harness.through_build());
    let uploader = MockUploader::new();
    let ctx = harness.context(&executor, &uploader, UserConfig::default());

    let result = run_pipeline(&ctx, &widget(), BUILD_ONLY).expect("pipeline");

    assert_eq!(result.state, Stage::Done);
    assert_eq!(result.package, "acme/widget");
    assert_eq!(result.version, "1.0.0");
    assert_eq!(result.git_path, "git@acme:widget.git");
    assert_eq!(result.gopath, harness.gopath());
    assert_eq!(result.binaries, vec![harness.staged_binary()]);
    let staged: Vec<_> = std::fs::read_dir(&harness.output)
        .expect("read output")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(staged, vec![std::ffi::OsString::from("widget_linux_amd64")]);
    executor.assert_finished();
}

#[rstest]
fn test_only_run_skips_build(harness: Harness) {
    let executor = StubExecutor::new(harness.prelude());
    let uploader = MockUploader::new();
    let ctx = harness.context(&executor, &uploader, UserConfig::default());

    let result = run_pipeline(&ctx, &widget(), StageFlags::default()).expect("pipeline");

    assert!(result.binaries.is_empty());
    assert!(!harness.output.exists());
    executor.assert_finished();
}

#[rstest]
fn extras_are_rendered_into_output_dir(harness: Harness) {
    let executor = StubExecutor::new(harness.through_build());
    let uploader = MockUploader::new();
    let ctx = harness.context(&executor, &uploader, UserConfig::default());
    let mut descriptor = widget();
    descriptor.build_info.extras.push(ExtraArtifact {
        template: Utf8PathBuf::from("install.tmpl"),
        file_name: "install.sh".to_owned(),
        executable: true,
    });

    let result = run_pipeline(&ctx, &descriptor, BUILD_ONLY).expect("pipeline");

    assert_eq!(result.extras, vec![harness.output.join("install.sh")]);
    assert!(harness.output.join("install.sh").is_file());
}

#[rstest]
fn failing_tests_stop_before_build(harness: Harness) {
    let mut calls = harness.prelude();
    if let Some(last) = calls.pop() {
        calls.push(last.returning(Ok(failure_output("--- FAIL: TestWidget"))));
    }
    let executor = StubExecutor::new(calls);
    let uploader = MockUploader::new();
    let ctx = harness.context(&executor, &uploader, UserConfig::default());

    let failure = run_pipeline(&ctx, &widget(), BUILD_ONLY).expect_err("tests fail");

    assert_eq!(failure.stage, Stage::Test);
    assert!(!failure.never_started());
    assert_eq!(failure.result.state, Stage::Failed);
    assert_eq!(failure.result.package, "acme/widget");
    assert!(failure.result.binaries.is_empty());
    assert!(matches!(failure.source, MasonError::Subprocess { .. }));
    executor.assert_finished();
}

#[rstest]
fn missing_identity_fails_before_signer_runs(harness: Harness) {
    let executor = StubExecutor::new(harness.through_build());
    let uploader = MockUploader::new();
    let ctx = harness.context(&executor, &uploader, UserConfig::default());
    let flags = StageFlags {
        sign: true,
        ..BUILD_ONLY
    };

    let failure = run_pipeline(&ctx, &widget(), flags).expect_err("no identity");

    assert_eq!(failure.stage, Stage::Sign);
    assert!(matches!(failure.source, MasonError::Resolution));
    assert_eq!(failure.result.binaries, vec![harness.staged_binary()]);
    assert!(executor.calls().iter().all(|call| call.program != "gpg"));
    executor.assert_finished();
}

fn sign_calls(harness: &Harness, program: &str, verify_ok: bool) -> Vec<ExpectedCall> {
    let binary = harness.staged_binary();
    let signature = format!("{binary}.asc");
    let verify = ExpectedCall::new(
        program,
        [
            "--trustdb",
            "/keys/trustdb.gpg",
            "--no-default-keyring",
            "--keyring",
            "/keys/pubring.gpg",
            "--verify",
            signature.as_str(),
        ],
    );
    vec![
        ExpectedCall::new(
            program,
            [
                "--trustdb",
                "/keys/trustdb.gpg",
                "--no-default-keyring",
                "--keyring",
                "/keys/pubring.gpg",
                "-bau",
                "ops@acme.test",
                binary.as_str(),
            ],
        )
        .creating(signature.as_str()),
        if verify_ok {
            verify
        } else {
            verify.returning(Ok(failure_output("BAD signature")))
        },
    ]
}

fn signed_widget() -> PackageDescriptor {
    PackageDescriptor {
        signing: SigningPolicy {
            program: String::new(),
            identity: "pkg@acme.test".to_owned(),
        },
        options: PipelineOptions {
            keyring: Some(Utf8PathBuf::from("/keys/pubring.gpg")),
            trustdb: Some(Utf8PathBuf::from("/keys/trustdb.gpg")),
            ..PipelineOptions::default()
        },
        ..widget()
    }
}

#[rstest]
fn user_identity_signs_and_verifies(harness: Harness) {
    let executor = StubExecutor::new(
        harness
            .through_build()
            .into_iter()
            .chain(sign_calls(&harness, "gpg2", true))
            .collect(),
    );
    let uploader = MockUploader::new();
    let user = UserConfig::new(Some("ops@acme.test".to_owned()), Some("gpg2".to_owned()));
    let ctx = harness.context(&executor, &uploader, user);
    let flags = StageFlags {
        sign: true,
        ..BUILD_ONLY
    };

    let result = run_pipeline(&ctx, &signed_widget(), flags).expect("pipeline");

    assert_eq!(
        result.signatures,
        vec![Utf8PathBuf::from(format!("{}.asc", harness.staged_binary()))]
    );
    executor.assert_finished();
}

#[rstest]
fn rejected_signature_fails_sign_stage(harness: Harness) {
    let executor = StubExecutor::new(
        harness
            .through_build()
            .into_iter()
            .chain(sign_calls(&harness, "gpg2", false))
            .collect(),
    );
    let uploader = MockUploader::new();
    let user = UserConfig::new(Some("ops@acme.test".to_owned()), Some("gpg2".to_owned()));
    let ctx = harness.context(&executor, &uploader, user);
    let flags = StageFlags {
        sign: true,
        ..BUILD_ONLY
    };

    let failure = run_pipeline(&ctx, &signed_widget(), flags).expect_err("rejected");

    assert_eq!(failure.stage, Stage::Sign);
    assert!(matches!(failure.source, MasonError::SignatureRejected { .. }));
    assert_eq!(failure.result.signatures.len(), 1);
}

#[rstest]
fn publish_uploads_binary_and_checksum(harness: Harness) {
    let executor = StubExecutor::new(harness.through_build());
    let mut uploader = MockUploader::new();
    uploader.expect_upload().times(2).returning(|_, _| Ok(()));
    let ctx = harness.context(&executor, &uploader, UserConfig::default());
    let descriptor = PackageDescriptor {
        publishing: PublishingInfo {
            repository: Some("https://repo.acme.test".to_owned()),
        },
        ..widget()
    };
    let flags = StageFlags {
        publish: true,
        ..BUILD_ONLY
    };

    let result = run_pipeline(&ctx, &descriptor, flags).expect("pipeline");

    assert_eq!(
        result.published,
        vec![
            "https://repo.acme.test/acme/widget/1.0.0/widget_linux_amd64".to_owned(),
            "https://repo.acme.test/acme/widget/1.0.0/widget_linux_amd64.sha256".to_owned(),
        ]
    );
}

#[rstest]
fn explicit_workdir_survives_failure(harness: Harness) {
    let executor = StubExecutor::new(vec![
        ExpectedCall::any_args("git").returning(Ok(failure_output("Permission denied"))),
    ]);
    let uploader = MockUploader::new();
    let ctx = harness.context(&executor, &uploader, UserConfig::default());

    let failure = run_pipeline(&ctx, &widget(), BUILD_ONLY).expect_err("clone fails");

    assert_eq!(failure.stage, Stage::Checkout);
    assert!(harness.gopath().join("src").is_dir());
}

#[rstest]
fn temporary_workdir_is_removed_after_failure(harness: Harness) {
    let executor = StubExecutor::new(vec![
        ExpectedCall::any_args("git").returning(Ok(failure_output("Permission denied"))),
    ]);
    let uploader = MockUploader::new();
    let mut ctx = harness.context(&executor, &uploader, UserConfig::default());
    ctx.workdir = None;

    let failure = run_pipeline(&ctx, &widget(), BUILD_ONLY).expect_err("clone fails");

    assert_eq!(failure.stage, Stage::Checkout);
    assert!(!failure.result.workdir.as_str().is_empty());
    assert!(!failure.result.workdir.exists());
}

#[rstest]
fn invalid_package_never_starts(harness: Harness) {
    let executor = StubExecutor::new(Vec::new());
    let uploader = MockUploader::new();
    let ctx = harness.context(&executor, &uploader, UserConfig::default());
    let descriptor = PackageDescriptor {
        package: "widget".to_owned(),
        ..widget()
    };

    let failure = run_pipeline(&ctx, &descriptor, BUILD_ONLY).expect_err("bad package");

    assert!(failure.never_started());
    assert!(executor.calls().is_empty());
    assert!(!harness.workdir.exists());
}

#[rstest]
fn missing_metadata_never_starts(harness: Harness) {
    let executor = StubExecutor::new(Vec::new());
    let uploader = MockUploader::new();
    let ctx = harness.context(&executor, &uploader, UserConfig::default());

    let failure = run_from_metadata(&ctx, &harness.workdir.join("metadata.json"), BUILD_ONLY)
        .expect_err("no metadata");

    assert!(failure.never_started());
    assert!(matches!(failure.source, MasonError::FileIo { .. }));
}

#[rstest]
#[case(Stage::Init, "init")]
#[case(Stage::DependencySync, "dependency sync")]
#[case(Stage::Publish, "publish")]
fn stage_names(#[case] stage: Stage, #[case] expected: &str) {
    assert_eq!(stage.to_string(), expected);
}
