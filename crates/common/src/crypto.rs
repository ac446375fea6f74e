//! Signing providers
//!
//! The core never produces PKCS#7 itself. It hands the signature file
//! header to a [`SigningProvider`] and stores whatever bytes come back as the
//! signature block. [`CommandSigner`] delegates to an external program such
//! as `openssl smime`; [`KeyPair`] is an Ed25519 signer for development and
//! tests.

use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use ed25519_dalek::{
    Signature, Signer as DalekSigner, SigningKey, Verifier as DalekVerifier, VerifyingKey,
};
use rand::rngs::OsRng;
use tokio::fs;
use tracing::debug;

use crate::{Error, Result};

/// Produces a detached signature over exactly the bytes supplied
pub trait SigningProvider {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

impl<T: SigningProvider + ?Sized> SigningProvider for &T {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(data)
    }
}

impl<T: SigningProvider + ?Sized> SigningProvider for Box<T> {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(data)
    }
}

/// Runs an external program: data on stdin, signature on stdout
///
/// A typical PKCS#7 invocation is
/// `openssl smime -sign -binary -noattr -outform DER -signer cert.pem -inkey key.pem -certfile chain.pem`.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    program: String,
    args: Vec<String>,
}

impl CommandSigner {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from an argv vector (`[program, args...]`)
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::InvalidConfig("signer command is empty".to_string()))?;
        Ok(Self::new(program.clone(), args.iter().cloned()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SigningProvider for CommandSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        debug!("Running signer: {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Signing(format!("failed to start {}: {}", self.program, e)))?;

        // stdin is written concurrently with reading stdout; dropping it
        // sends EOF
        let stdin = child.stdin.take();
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(data),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer.join().unwrap_or_else(|_| {
                Err(io::Error::new(io::ErrorKind::Other, "stdin writer panicked"))
            });
            (written, output)
        });

        let output = output?;
        if !output.status.success() {
            return Err(Error::Signing(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        written?;
        if output.stdout.is_empty() {
            return Err(Error::Signing(format!(
                "{} produced no signature",
                self.program
            )));
        }
        Ok(output.stdout)
    }
}

/// Ed25519 key pair for signing
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Load key pair from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path).await?;
        Self::from_bytes(&data)
    }

    /// Key pair from a raw 32-byte secret
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = data
            .try_into()
            .map_err(|_| Error::Crypto("Invalid key length".to_string()))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&bytes),
        })
    }

    /// Save key pair to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.signing_key.to_bytes()).await?;
        Ok(())
    }

    /// Get the public key bytes
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Get the public key as hex
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Get the verifying key
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

impl SigningProvider for KeyPair {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(self.signing_key.sign(data).to_bytes().to_vec())
    }
}

/// Trait for types that can verify signatures
pub trait Verifier {
    /// Verify a signature
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()>;
}

impl Verifier for VerifyingKey {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let sig_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| Error::Crypto("Invalid signature length".to_string()))?;
        let sig = Signature::from_bytes(&sig_bytes);
        DalekVerifier::verify(self, data, &sig)?;
        Ok(())
    }
}

impl Verifier for KeyPair {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        Verifier::verify(&self.verifying_key(), data, signature)
    }
}

/// Create a verifying key from raw bytes
pub fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey> {
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Crypto("Invalid public key length".to_string()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| Error::Crypto(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let kp = KeyPair::generate();
        let data = b"Signature-Version: 1.0\n";
        let signature = kp.sign(data).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(kp.verify(data, &signature).is_ok());
    }

    #[test]
    fn test_tampered_signature() {
        let kp = KeyPair::generate();
        let data = b"test message";
        let mut signature = kp.sign(data).unwrap();
        signature[0] ^= 0xff;
        assert!(kp.verify(data, &signature).is_err());
    }

    #[test]
    fn test_verifying_key_from_bytes() {
        let kp = KeyPair::generate();
        let vk = verifying_key_from_bytes(&kp.public_key_bytes()).unwrap();
        let signature = kp.sign(b"data").unwrap();
        assert!(Verifier::verify(&vk, b"data", &signature).is_ok());
        assert!(verifying_key_from_bytes(&[0u8; 5]).is_err());
    }

    #[tokio::test]
    async fn test_key_save_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dev.key");
        let kp = KeyPair::generate();
        kp.save(&path).await.unwrap();

        let loaded = KeyPair::load(&path).await.unwrap();
        assert_eq!(loaded.public_key_bytes(), kp.public_key_bytes());
    }

    #[tokio::test]
    async fn test_load_rejects_bad_length() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("short.key");
        std::fs::write(&path, b"short").unwrap();
        assert!(matches!(KeyPair::load(&path).await, Err(Error::Crypto(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_signer_passes_stdin_through() {
        let signer = CommandSigner::new("cat", Vec::<String>::new());
        let out = signer.sign(b"header bytes").unwrap();
        assert_eq!(out, b"header bytes");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_signer_failure() {
        let signer = CommandSigner::new("sh", ["-c", "echo boom >&2; exit 3"]);
        match signer.sign(b"data") {
            Err(Error::Signing(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected signing error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_command_signer_output_before_input() {
        // one megabyte each way overflows both pipe buffers
        let signer = CommandSigner::new(
            "sh",
            ["-c", "head -c 1048576 /dev/zero; cat >/dev/null"],
        );
        let data = vec![b'x'; 1 << 20];
        let out = signer.sign(&data).unwrap();
        assert_eq!(out.len(), 1 << 20);
    }

    #[test]
    fn test_command_signer_missing_program() {
        let signer = CommandSigner::new("xpisign-no-such-signer", Vec::<String>::new());
        assert!(matches!(signer.sign(b"data"), Err(Error::Signing(_))));
    }

    #[test]
    fn test_from_argv() {
        assert!(CommandSigner::from_argv(&[]).is_err());
        let signer = CommandSigner::from_argv(&["openssl".to_string(), "smime".to_string()]).unwrap();
        assert_eq!(signer.program(), "openssl");
    }
}
