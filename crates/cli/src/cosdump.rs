//! cosdump - inspect the COS layer of a PDF file
//!
//! Tokenizes content streams, lists object offsets and computes signature
//! byte ranges.

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use carousel_core::{
    ContentTokenizer, CosObject, ObjectOffsets, OffsetTable, SeekableStream,
    SignatureRangeExtractor,
};
use clap::{Args, Parser, Subcommand};
use memmap2::Mmap;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cosdump")]
#[command(author, version, about = "Inspect PDF COS streams", long_about = None)]
struct Cli {
    /// Read through a file handle instead of memory-mapping the input
    #[arg(long, global = true)]
    no_mmap: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tokenize a content stream
    Tokens(TokensArgs),
    /// Compute the byte range of a signature dictionary
    ByteRange(ByteRangeArgs),
    /// List `<num> <gen> obj` headers and their offsets
    Objects {
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TokensArgs {
    file: PathBuf,

    /// Start of the content stream within the file
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Length of the content stream (default: to end of file)
    #[arg(long)]
    length: Option<u64>,

    /// Print one JSON object per token
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ByteRangeArgs {
    file: PathBuf,

    /// Offset of the signature dictionary's `obj` header
    #[arg(long)]
    offset: u64,

    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct TokenRecord {
    offset: u64,
    kind: &'static str,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_len: Option<u64>,
}

#[derive(Serialize)]
struct ByteRangeRecord {
    byte_range: [u64; 4],
    covered: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carousel_core=info,cosdump=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut out = BufWriter::new(io::stdout().lock());
    match &cli.command {
        Command::Tokens(args) => {
            let stream = open(&args.file, cli.no_mmap)?;
            dump_tokens(&mut out, stream, args)?;
        }
        Command::ByteRange(args) => {
            let stream = open(&args.file, cli.no_mmap)?;
            dump_byte_range(&mut out, stream, args)?;
        }
        Command::Objects { file } => {
            let mut stream = open(file, cli.no_mmap)?;
            let table = ObjectOffsets::scan(&mut stream)?;
            writeln!(out, "header at {}", table.header_offset())?;
            for (key, offset) in table.entries() {
                writeln!(out, "{key}\t{offset}")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn open(path: &Path, no_mmap: bool) -> Result<SeekableStream> {
    if no_mmap {
        return SeekableStream::open(path)
            .with_context(|| format!("cannot open {}", path.display()));
    }
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    // SAFETY: the map is read-only and the file is not modified while mapped.
    let mmap = unsafe { Mmap::map(&file) }?;
    Ok(SeekableStream::from_bytes(Bytes::from_owner(mmap)))
}

fn dump_tokens<W: Write>(out: &mut W, stream: SeekableStream, args: &TokensArgs) -> Result<()> {
    if args.offset > stream.len() {
        bail!("offset {} is past the end of the file ({} bytes)", args.offset, stream.len());
    }
    let length = args.length.unwrap_or(stream.len() - args.offset);
    let content = stream.substream(args.offset, length)?;
    drop(stream);

    let mut tokenizer = ContentTokenizer::new(content);
    loop {
        tokenizer.skip_whitespace()?;
        let offset = tokenizer.offset() + args.offset;
        let Some(token) = tokenizer.parse_next_token()? else {
            break;
        };
        let record = TokenRecord {
            offset,
            kind: token.type_name(),
            value: render(&token),
            image_len: token
                .as_operator()
                .ok()
                .and_then(|op| op.image_data())
                .map(SeekableStream::len),
        };
        if args.json {
            serde_json::to_writer(&mut *out, &record)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}\t{}\t{}", record.offset, record.kind, record.value)?;
        }
    }
    if let Some(offset) = tokenizer.corruption_offset() {
        tracing::warn!(offset = offset + args.offset, "content stream is corrupted");
    }
    tokenizer.close_image_data_streams();
    Ok(())
}

fn dump_byte_range<W: Write>(
    out: &mut W,
    mut stream: SeekableStream,
    args: &ByteRangeArgs,
) -> Result<()> {
    let table = ObjectOffsets::scan(&mut stream)?;
    let mut extractor = SignatureRangeExtractor::new(stream, &table);
    let Some(range) = extractor.byte_range_at(args.offset)? else {
        bail!("no /Contents entry in the dictionary at offset {}", args.offset);
    };
    if args.json {
        let record = ByteRangeRecord {
            byte_range: range.as_array(),
            covered: range.covered_len(),
        };
        serde_json::to_writer(&mut *out, &record)?;
        writeln!(out)?;
    } else {
        let [a, b, c, d] = range.as_array();
        writeln!(out, "[{a} {b} {c} {d}]")?;
    }
    Ok(())
}

fn render(obj: &CosObject) -> String {
    match obj {
        CosObject::Null => "null".to_string(),
        CosObject::Bool(b) => b.to_string(),
        CosObject::Int(n) => n.to_string(),
        CosObject::Real(n) => n.to_string(),
        CosObject::Name(name) => format!("/{name}"),
        CosObject::String(s) if s.is_hex() => format!("<{}>", hex_upper(s.as_bytes())),
        CosObject::String(s) => format!("({})", String::from_utf8_lossy(s.as_bytes())),
        CosObject::Array(items) => {
            let items: Vec<_> = items.iter().map(render).collect();
            format!("[{}]", items.join(" "))
        }
        CosObject::Dict(dict) => {
            let entries: Vec<_> = dict
                .iter()
                .map(|(k, v)| format!("/{k} {}", render(v)))
                .collect();
            format!("<<{}>>", entries.join(" "))
        }
        CosObject::Stream(stream) => format!("{} stream", render(&CosObject::Dict(stream.dict.clone()))),
        CosObject::Operator(op) => match op.image_params() {
            Some(params) if !params.is_empty() => {
                format!("{op} {}", render(&CosObject::Dict(params.clone())))
            }
            _ => op.to_string(),
        },
        CosObject::Ref(key) => format!("{} {} R", key.objid, key.genno),
    }
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}
