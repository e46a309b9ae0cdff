use crate::core::error::Result;
use crate::core::fs::make_parent_dirs;
use grep_cli::stdout;
use gzp::{deflate::Gzip, Compression, ZBuilder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use termcolor::ColorChoice;

/// Options for tab-separated output streams.
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    /// Compress the stream with gzip.
    pub gzipped: bool,
    /// Compression threads handed to gzp.
    pub threads: usize,
    /// Deflate level (0-9).
    pub compression_level: u32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            gzipped: false,
            threads: 1,
            compression_level: 6,
        }
    }
}

fn compress<W: Write + Send + 'static>(writer: W, options: WriterOptions) -> Box<dyn Write> {
    if options.gzipped {
        Box::new(
            ZBuilder::<Gzip, _>::new()
                .num_threads(options.threads.max(1))
                .compression_level(Compression::new(options.compression_level.min(9)))
                .from_writer(writer),
        )
    } else {
        Box::new(writer)
    }
}

/// Build a headerless TSV writer targeting a file, or stdout for `None` / `-`.
pub fn get_writer<P: AsRef<Path>>(
    path: Option<P>,
    options: WriterOptions,
) -> Result<csv::Writer<Box<dyn Write>>> {
    let raw_writer: Box<dyn Write> = match path {
        Some(path) if path.as_ref() != Path::new("-") => {
            make_parent_dirs(path.as_ref())?;
            compress(BufWriter::new(File::create(path.as_ref())?), options)
        }
        _ => compress(stdout(ColorChoice::Never), options),
    };

    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(raw_writer))
}
