//! Signature production and verification.
//!
//! Identity and program are resolved from two sources: the package's
//! [`SigningPolicy`] and the operator's [`UserConfig`]. Non-empty user values
//! win. Signatures are detached, ASCII-armoured and written next to the
//! binary as `<binary>.asc`.

use crate::error::{MasonError, Result};
use crate::exec::{CommandExecutor, CommandSpec, EnvOverlay, combined_output, run_checked};
use crate::metadata::{DEFAULT_SIGNING_PROGRAM, SigningPolicy};
use crate::user_config::UserConfig;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};

/// Suffix appended to a binary path to name its detached signature.
pub const SIGNATURE_SUFFIX: &str = ".asc";

/// A keyring and trust database used instead of the signer's defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStore {
    /// Public keyring path.
    pub keyring: Utf8PathBuf,
    /// Trust database path.
    pub trustdb: Utf8PathBuf,
}

impl TrustStore {
    fn args(&self) -> [String; 5] {
        [
            "--trustdb".to_owned(),
            self.trustdb.to_string(),
            "--no-default-keyring".to_owned(),
            "--keyring".to_owned(),
            self.keyring.to_string(),
        ]
    }
}

/// Path of the detached signature for `binary`.
#[must_use]
pub fn signature_path(binary: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{binary}{SIGNATURE_SUFFIX}"))
}

/// Program and identity resolved for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningProfile {
    program: String,
    identity: String,
}

impl SigningProfile {
    /// Resolve the signing program and identity.
    ///
    /// The policy provides the defaults (program falls back to `gpg`);
    /// non-empty user-configuration values override them.
    ///
    /// # Examples
    ///
    /// ```
    /// use mason::metadata::SigningPolicy;
    /// use mason::signing::SigningProfile;
    /// use mason::user_config::UserConfig;
    ///
    /// let policy = SigningPolicy { program: String::new(), identity: "a@pkg.test".into() };
    /// let user = UserConfig::new(Some("ops@acme.test".into()), None);
    /// let profile = SigningProfile::resolve(&policy, &user);
    /// assert_eq!(profile.program(), "gpg");
    /// assert_eq!(profile.identity()?, "ops@acme.test");
    /// # Ok::<(), mason::error::MasonError>(())
    /// ```
    #[must_use]
    pub fn resolve(policy: &SigningPolicy, user: &UserConfig) -> Self {
        let program = user
            .program()
            .or_else(|| Some(policy.program.trim()).filter(|p| !p.is_empty()))
            .unwrap_or(DEFAULT_SIGNING_PROGRAM)
            .to_owned();
        let identity = user
            .identity()
            .unwrap_or_else(|| policy.identity.trim())
            .to_owned();
        Self { program, identity }
    }

    /// The signing program.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The signing identity.
    ///
    /// # Errors
    ///
    /// Returns [`MasonError::Resolution`] when neither source supplied one.
    pub fn identity(&self) -> Result<&str> {
        if self.identity.is_empty() {
            Err(MasonError::Resolution)
        } else {
            Ok(&self.identity)
        }
    }
}

/// Drives the external signer and verifier.
pub struct Signer<'a> {
    executor: &'a dyn CommandExecutor,
    program: String,
    trust_store: Option<TrustStore>,
    env: EnvOverlay,
}

impl<'a> Signer<'a> {
    /// Create a signer that runs `program`.
    #[must_use]
    pub fn new(
        executor: &'a dyn CommandExecutor,
        program: impl Into<String>,
        trust_store: Option<TrustStore>,
    ) -> Self {
        Self {
            executor,
            program: program.into(),
            trust_store,
            env: EnvOverlay::new(),
        }
    }

    /// Apply `overlay` to every signer invocation.
    #[must_use]
    pub fn with_env(mut self, overlay: EnvOverlay) -> Self {
        self.env = overlay;
        self
    }

    fn command(&self) -> CommandSpec {
        let spec = CommandSpec::new(&self.program).envs(&self.env);
        match &self.trust_store {
            Some(store) => spec.args(store.args()),
            None => spec,
        }
    }

    /// Produce a detached signature for `binary` as `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`MasonError::Launch`] if the signer cannot be started and
    /// [`MasonError::Subprocess`] if it exits unsuccessfully.
    pub fn sign(&self, binary: &Utf8Path, identity: &str) -> Result<Utf8PathBuf> {
        info!("signing {binary} as {identity}");
        let spec = self
            .command()
            .args(["-bau", identity])
            .arg(binary.as_str());
        run_checked(self.executor, &spec)?;
        Ok(signature_path(binary))
    }

    /// Check the detached signature of `binary`.
    ///
    /// A missing signature file is `Ok(false)` and nothing is spawned. Any
    /// unsuccessful verifier exit is also `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`MasonError::Launch`] only if the verifier cannot be started.
    pub fn verify(&self, binary: &Utf8Path) -> Result<bool> {
        let signature = signature_path(binary);
        if !signature.is_file() {
            debug!("no signature at {signature}");
            return Ok(false);
        }
        let spec = self.command().arg("--verify").arg(signature.as_str());
        let output = self.executor.run(&spec)?;
        if !output.status.success() {
            debug!(
                "verification of {signature} failed ({}): {}",
                output.status,
                combined_output(&output)
            );
        }
        Ok(output.status.success())
    }
}
