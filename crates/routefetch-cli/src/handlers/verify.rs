//! `verify`: check a local file without downloading anything.

use std::path::Path;

use routefetch_core::DigestAlgorithm;
use routefetch_download::ChecksumVerifier;

use crate::error::CliError;

/// Execute the `verify` command.
///
/// With no expectations given, prints the file's size and digest.
pub async fn execute(
    file: &Path,
    size: Option<u64>,
    checksum: Option<&str>,
    checksum_algorithm: Option<DigestAlgorithm>,
    default_digest: DigestAlgorithm,
) -> Result<(), CliError> {
    let verifier = ChecksumVerifier::for_request(checksum_algorithm, checksum, default_digest);

    let len = tokio::fs::metadata(file)
        .await
        .map_err(|e| CliError::Io(format!("{}: {e}", file.display())))?
        .len();
    let digest = verifier.digest_file(file).await?;
    println!("{}", file.display());
    println!("  size:   {len}");
    println!("  {:<7} {digest}", format!("{}:", verifier.algorithm()));

    if size.is_none() && checksum.is_none() {
        return Ok(());
    }
    verifier.verify(file, size, checksum).await?;
    println!("  OK");
    Ok(())
}
