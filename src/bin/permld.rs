// Permutation linker
//
//  Copyright (C) 2014-2023 Ryan Specialty, LLC.
//
//  This file is part of permlink.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! This is the permutation linker,
//!   so named after the traditional `ld` Unix utility.
//! Its job is to take each compiled permutation of a module and produce
//!   the files to deploy,
//!     including the selection script that chooses among them.
//!
//! For more information about the linker,
//!   see the [`permlink::ld`] module.

extern crate permlink;

use getopts::{Fail, Options};
use permlink::{
    cache::{BlobStore, CacheError, DiskStore, MemoryStore},
    fs::{SearchPathLoader, WriteOnceFilesystem},
    js::OutputMode,
    ld::{LinkError, LinkerContext, OutputDirs, StandardLinkerContext},
    manifest::{Manifest, ManifestError},
};
use std::{
    env,
    error::Error,
    fmt::{self, Display},
    io,
    sync::Arc,
};
use tracing_subscriber::EnvFilter;

/// Types of commands
#[derive(Debug, PartialEq)]
enum Command {
    Link(LinkOptions),
    Usage,
}

/// Everything needed to perform a link.
#[derive(Debug, PartialEq)]
struct LinkOptions {
    manifest: String,
    out: String,
    extra: Option<String>,
    deploy: Option<String>,
    resources: Vec<String>,

    /// Output mode overriding that of the manifest.
    output_mode: Option<OutputMode>,

    disk_cache: bool,
    verbose: bool,
}

/// Entrypoint for the linker
pub fn main() {
    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = get_opts();
    let usage =
        opts.usage(&format!("Usage: {} [OPTIONS] -o OUTDIR MANIFEST", program));

    match parse_options(opts, args) {
        Ok(Command::Link(options)) => {
            init_logging(options.verbose);

            if let Err(e) = link(&options) {
                tracing::error!(manifest = options.manifest.as_str(), "link failed");
                eprintln!("{}", report(&e));
                std::process::exit(1);
            }

            std::process::exit(exitcode::OK);
        }
        Ok(Command::Usage) => {
            println!("{}", usage);
            std::process::exit(exitcode::OK);
        }
        Err(e) => {
            eprintln!("{}", e);
            println!("{}", usage);
            std::process::exit(exitcode::USAGE);
        }
    }
}

/// Log to stderr,
///   at `debug` if verbose and otherwise `warn`,
///   unless overridden by `RUST_LOG`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Link the module described by the manifest.
fn link(options: &LinkOptions) -> Result<(), PermldError> {
    let mut manifest = Manifest::load(&options.manifest)?;

    if let Some(mode) = options.output_mode {
        manifest.config.output_mode = mode;
    }

    let linkers = manifest.registrations()?;

    let store: Arc<dyn BlobStore> = if options.disk_cache {
        Arc::new(DiskStore::new()?)
    } else {
        Arc::new(MemoryStore::new())
    };

    let ctx = LinkerContext::new(manifest.config, store)
        .with_resources(Box::new(SearchPathLoader::new(&options.resources)));

    let mut sld = StandardLinkerContext::new(ctx, linkers)?;

    for perm in manifest.permutations {
        sld.add_compilation(perm)?;
    }

    let artifacts = sld.link()?;

    let mut dirs = OutputDirs::new(&options.out);

    if let Some(extra) = &options.extra {
        dirs = dirs.with_extra(extra);
    }

    if let Some(deploy) = &options.deploy {
        dirs = dirs.with_deploy(deploy);
    }

    let mut fs: WriteOnceFilesystem = WriteOnceFilesystem::new();
    sld.produce_output(&mut fs, &artifacts, &dirs)?;

    Ok(())
}

/// Render an error and each of its causes,
///   one per line.
fn report(e: &dyn Error) -> String {
    let mut out = format!("error: {}", e);
    let mut source = e.source();

    while let Some(cause) = source {
        out.push_str(&format!("\n  caused by: {}", cause));
        source = cause.source();
    }

    out
}

/// Get 'Options'
///
/// ```
/// use getopts::Options;
///
/// let opts = get_opts();
/// ```
fn get_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt("o", "output", "set output directory", "OUTDIR");
    opts.optopt("", "extra", "directory for private linker output", "DIR");
    opts.optopt("", "deploy", "directory for deploy-only output", "DIR");
    opts.optmulti(
        "",
        "resources",
        "search directory for linker templates",
        "DIR",
    );
    opts.optopt(
        "",
        "output-mode",
        "override the manifest's output mode",
        "obfuscated|pretty|detailed",
    );
    opts.optflag(
        "",
        "disk-cache",
        "hold compiled programs on disk rather than in memory",
    );
    opts.optflag("v", "verbose", "log each step of the link");
    opts.optflag("h", "help", "print this help menu");
    opts
}

/// Option parser
fn parse_options(opts: Options, args: Vec<String>) -> Result<Command, Fail> {
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            return Err(f);
        }
    };

    if matches.opt_present("h") {
        return Ok(Command::Usage);
    }

    let manifest = match matches.free.len() {
        0 => return Err(Fail::OptionMissing(String::from("MANIFEST"))),
        1 => matches.free[0].clone(),
        _ => return Err(Fail::UnrecognizedOption(matches.free[1].clone())),
    };

    let out = match matches.opt_str("o") {
        Some(m) => m,
        None => {
            return Err(Fail::OptionMissing(String::from("-o OUTDIR")));
        }
    };

    let output_mode = match matches.opt_str("output-mode") {
        Some(m) => Some(m.parse::<OutputMode>().map_err(|_| {
            Fail::UnexpectedArgument(format!("--output-mode {}", m))
        })?),
        None => None,
    };

    Ok(Command::Link(LinkOptions {
        manifest,
        out,
        extra: matches.opt_str("extra"),
        deploy: matches.opt_str("deploy"),
        resources: matches.opt_strs("resources"),
        output_mode,
        disk_cache: matches.opt_present("disk-cache"),
        verbose: matches.opt_present("v"),
    }))
}

/// Linker (`permld`) error.
///
/// This represents the aggregation of all possible errors that can occur
///   during link-time.
#[derive(Debug)]
pub enum PermldError {
    Manifest(ManifestError),
    Link(LinkError),
    Cache(CacheError),
}

impl From<ManifestError> for PermldError {
    fn from(e: ManifestError) -> Self {
        Self::Manifest(e)
    }
}

impl From<LinkError> for PermldError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<CacheError> for PermldError {
    fn from(e: CacheError) -> Self {
        Self::Cache(e)
    }
}

impl Display for PermldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manifest(e) => Display::fmt(e, f),
            Self::Link(e) => Display::fmt(e, f),
            Self::Cache(e) => Display::fmt(e, f),
        }
    }
}

impl Error for PermldError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Manifest(e) => e.source(),
            Self::Link(e) => e.source(),
            Self::Cache(e) => e.source(),
        }
    }
}
