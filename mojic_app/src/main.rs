//! mojic — obfuscate C source into password-sealed emoji streams.
//!
//! `encode` turns `.c` files into `.mojic` siblings, `decode` restores
//! them, `rotate` re-encrypts `.mojic` files in place (new password, or
//! just a fresh salt). One engine and one fresh salt per file; every write
//! goes through a temp file in the target directory and lands by rename.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rpassword::prompt_password;

use mojic::{decode_header, MojicEngine};

const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Parser)]
#[command(name = "mojic", version, about = "Obfuscate C source into password-sealed emoji streams")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode .c files (or directories of them) into .mojic siblings
    Encode {
        /// Files or directories to encode
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Decode .mojic files (or directories) back into .restored.c
    Decode {
        /// Files or directories to decode
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Re-encrypt .mojic files in place under a new password or fresh salt
    Rotate {
        /// Files or directories to rotate
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Encode { paths } => {
            let files = collect_inputs(&paths, "c")?;
            let password = confirmed_password("Password: ")?;
            for f in &files {
                encode_file(f, &password)?;
            }
        }
        Commands::Decode { paths } => {
            let files = collect_inputs(&paths, "mojic")?;
            let password = checked_password("Password: ")?;
            for f in &files {
                decode_file(f, &password)?;
            }
        }
        Commands::Rotate { paths } => {
            let files = collect_inputs(&paths, "mojic")?;
            let old = checked_password("Current password: ")?;
            let entered = prompt_password("New password (blank to keep, re-seeding only): ")?;
            let new = if entered.is_empty() {
                old.clone()
            } else {
                require_length(&entered)?;
                let again = prompt_password("Confirm new password: ")?;
                if entered != again {
                    bail!("passwords do not match");
                }
                entered
            };
            for f in &files {
                rotate_file(f, &old, &new)?;
            }
        }
    }
    Ok(())
}

/* ---------------- passwords ---------------- */

fn require_length(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        bail!("password must be at least {MIN_PASSWORD_CHARS} characters");
    }
    Ok(())
}

fn checked_password(prompt: &str) -> Result<String> {
    let password = prompt_password(prompt)?;
    require_length(&password)?;
    Ok(password)
}

fn confirmed_password(prompt: &str) -> Result<String> {
    let password = checked_password(prompt)?;
    let again = prompt_password("Confirm password: ")?;
    if password != again {
        bail!("passwords do not match");
    }
    Ok(password)
}

/* ---------------- file discovery ---------------- */

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

fn collect_inputs(paths: &[PathBuf], ext: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for p in paths {
        if p.is_dir() {
            walk_dir(p, ext, &mut files)?;
        } else if has_extension(p, ext) {
            files.push(p.clone());
        } else {
            bail!("'{}' is not a .{ext} file", p.display());
        }
    }
    if files.is_empty() {
        bail!("no .{ext} files found");
    }
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, ext: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading directory '{}'", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            walk_dir(&path, ext, out)?;
        } else if has_extension(&path, ext) {
            out.push(path);
        }
    }
    Ok(())
}

/* ---------------- passes ---------------- */

fn encode_file(path: &Path, password: &str) -> Result<()> {
    let plain =
        fs::read(path).with_context(|| format!("reading '{}'", path.display()))?;

    let mut engine = MojicEngine::new(password);
    engine.init(None, None)?;
    let mut file = engine.encode_header()?;
    file.push_str(&engine.encode_stream(&plain)?);

    let target = path.with_extension("mojic");
    write_atomic(&target, file.as_bytes())?;
    info!("encoded '{}' ({} bytes)", path.display(), plain.len());
    println!("{} -> {}", path.display(), target.display());
    Ok(())
}

fn decode_file(path: &Path, password: &str) -> Result<()> {
    let plain = recover(path, password)?;

    let stem = path
        .file_stem()
        .with_context(|| format!("'{}' has no file stem", path.display()))?;
    let target = path.with_file_name(format!("{}.restored.c", stem.to_string_lossy()));
    write_atomic(&target, &plain)?;
    info!("decoded '{}' ({} bytes)", path.display(), plain.len());
    println!("{} -> {}", path.display(), target.display());
    Ok(())
}

fn rotate_file(path: &Path, old_password: &str, new_password: &str) -> Result<()> {
    let plain = recover(path, old_password)?;

    let mut engine = MojicEngine::new(new_password);
    engine.init(None, None)?;
    let mut file = engine.encode_header()?;
    file.push_str(&engine.encode_stream(&plain)?);

    write_atomic(path, file.as_bytes())?;
    info!("rotated '{}'", path.display());
    println!("{} rotated", path.display());
    Ok(())
}

fn recover(path: &Path, password: &str) -> Result<Vec<u8>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading '{}'", path.display()))?;
    let header = decode_header(&text)
        .with_context(|| format!("parsing header of '{}'", path.display()))?;

    let mut engine = MojicEngine::new(password);
    engine.init(Some(&header.salt), Some(header.auth_check))?;

    let payload = text.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    engine
        .decode_stream(payload)
        .with_context(|| format!("decoding '{}'", path.display()))
}

/* ---------------- output ---------------- */

/// Writes through a temp file in the target directory and renames into
/// place, so a failed pass never leaves a partial output behind.
fn write_atomic(target: &Path, contents: &[u8]) -> Result<()> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".mojic-tmp-")
        .tempfile_in(dir)
        .with_context(|| format!("creating temporary file in '{}'", dir.display()))?;
    tmp.write_all(contents).context("writing output")?;
    tmp.persist(target)
        .with_context(|| format!("replacing '{}'", target.display()))?;
    Ok(())
}
