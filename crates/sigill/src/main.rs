#![forbid(unsafe_code)]

//! Sigill CLI — sign and verify XML documents.

use clap::{Parser, Subcommand};
use sigill_core::Error;
use sigill_dsig::{SigningContext, ValidationContext};
use sigill_keys::loader;
use sigill_keys::{MemoryCertificateStore, MemoryKeyStore};
use sigill_xml::Element;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use x509_cert::der::Encode;

#[derive(Parser)]
#[command(
    name = "sigill",
    about = "Sigill — XML Digital Signatures (XML-DSig) in pure Rust",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign the root element of an XML document (enveloped signature)
    Sign {
        /// Input XML file
        file: PathBuf,

        /// RSA private key (PEM, PKCS#8 or PKCS#1)
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// Signing certificate (PEM)
        #[arg(short = 'c', long)]
        cert: PathBuf,

        /// Use the KYC profile (SHA-1, `id` attribute, no prefix,
        /// Canonical XML 1.0)
        #[arg(long)]
        kyc: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify the signature of an XML document
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Trusted root certificates (PEM, may repeat)
        #[arg(short = 't', long = "trusted", required = true)]
        trusted: Vec<PathBuf>,

        /// Use the KYC profile (`id` attribute)
        #[arg(long)]
        kyc: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Sign {
            file,
            key,
            cert,
            kyc,
            output,
        } => {
            let key_pem = std::fs::read(&key)?;
            let cert_pem = std::fs::read(&cert)?;
            let private_key = loader::load_rsa_private_pem(&key_pem)?;
            let certs = loader::load_certificates_pem(&cert_pem)?;
            let leaf = certs.first().ok_or(Error::MissingCertificates)?;
            let leaf_der = leaf
                .to_der()
                .map_err(|e| Error::Certificate(e.to_string()))?;

            let store = Arc::new(MemoryKeyStore::new(private_key, leaf_der));
            let ctx = if kyc {
                SigningContext::new_kyc(store)
            } else {
                SigningContext::new_default(store)
            };

            let xml = std::fs::read_to_string(&file)?;
            let root = Element::parse(&xml)?;
            let signed = ctx.sign_enveloped(&root)?;

            match output {
                Some(path) => std::fs::write(path, signed.to_xml_string())?,
                None => println!("{signed}"),
            }
            Ok(())
        }
        Commands::Verify { file, trusted, kyc } => {
            let mut roots = Vec::new();
            for path in &trusted {
                let pem = std::fs::read(path)?;
                roots.extend(loader::load_certificates_pem(&pem)?);
            }

            let store = Arc::new(MemoryCertificateStore::new(roots));
            let ctx = if kyc {
                ValidationContext::new_kyc(store)
            } else {
                ValidationContext::new_default(store)
            };

            let xml = std::fs::read_to_string(&file)?;
            let verified = ctx.validate_xml(&xml)?;
            eprintln!("signature valid; verified element: {}", verified.tag());
            Ok(())
        }
    }
}
