//! evtag command-line tool
//!
//! Inspects a model's mapping file, encodes sentences into the model's
//! input ids, and decodes raw model output back into tags.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use evtag_core::{
    DEFAULT_UNKNOWN_WORD, EncodedFeatures, FeatureEncoder, TagDecoder, Tokenizer, Vocabulary,
    extract_mentions,
};
use serde::Serialize;
use tracing::info;

/// CLI arguments
#[derive(Parser)]
#[command(name = "evtag")]
#[command(about = "Encode sentences for, and decode output from, an event-trigger tagging model")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON mapping file with `id_to_word`, `id_to_char` and `id_to_tag`
    #[arg(short, long, env = "EVTAG_MAPPINGS")]
    mappings: PathBuf,

    /// Sentinel word standing in for unknown tokens
    #[arg(long, env = "EVTAG_UNKNOWN_WORD", default_value = DEFAULT_UNKNOWN_WORD)]
    unknown_word: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print vocabulary sizes and the unknown-word id
    Vocab,

    /// Encode one sentence (or one per stdin line) and print the model inputs as JSON
    Encode {
        /// Tokens of the sentence
        tokens: Vec<String>,

        /// Tokenize this raw text instead of taking tokens
        #[arg(long, conflicts_with = "tokens")]
        text: Option<String>,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Decode a raw prediction into tags
    Decode {
        /// Word count the sentence was encoded with (token count minus one)
        #[arg(long, allow_hyphen_values = true)]
        word_count: i64,

        /// Raw predicted ids, comma separated, boundary positions included
        #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
        raw: Vec<i64>,

        /// Whitespace-separated tokens of the sentence, to print mentions
        #[arg(long)]
        tokens: Option<String>,
    },
}

/// Encoded sentence as printed by `encode`.
#[derive(Serialize)]
struct EncodeOutput<'a> {
    tokens: &'a [String],
    #[serde(flatten)]
    features: &'a EncodedFeatures,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let vocab = Vocabulary::from_file(&cli.mappings, &cli.unknown_word)
        .with_context(|| format!("loading {}", cli.mappings.display()))?;
    let vocab = Arc::new(vocab);

    match cli.command {
        Commands::Vocab => {
            println!("words\t{}", vocab.words().len());
            println!("chars\t{}", vocab.chars().len());
            println!("tags\t{}", vocab.tags().len());
            println!("{}\t{}", vocab.unknown_word(), vocab.unknown_word_id());
        }

        Commands::Encode {
            tokens,
            text,
            pretty,
        } => {
            let encoder = FeatureEncoder::new(vocab);
            let stdout = io::stdout();
            let mut out = stdout.lock();

            if let Some(text) = text {
                let tokens = Tokenizer::new()?.tokenize(&text).texts();
                write_encoded(&mut out, &encoder, &tokens, pretty)?;
            } else if !tokens.is_empty() {
                write_encoded(&mut out, &encoder, &tokens, pretty)?;
            } else {
                info!("reading whitespace-tokenized sentences from stdin");
                for line in io::stdin().lock().lines() {
                    let line = line?;
                    let tokens: Vec<String> =
                        line.split_whitespace().map(str::to_string).collect();
                    if tokens.is_empty() {
                        continue;
                    }
                    write_encoded(&mut out, &encoder, &tokens, pretty)?;
                }
            }
        }

        Commands::Decode {
            word_count,
            raw,
            tokens,
        } => {
            let decoder = TagDecoder::new(vocab);
            let tags = decoder.decode(&raw, word_count)?;

            match tokens {
                None => {
                    for tag in &tags {
                        println!("{tag}");
                    }
                }
                Some(tokens) => {
                    let tokens: Vec<&str> = tokens.split_whitespace().collect();
                    if tokens.len() != tags.len() {
                        bail!(
                            "{} tokens given but {} tags decoded",
                            tokens.len(),
                            tags.len()
                        );
                    }
                    for (token, tag) in tokens.iter().zip(&tags) {
                        println!("{token}\t{tag}");
                    }
                    for mention in extract_mentions(&tokens, &tags)? {
                        println!(
                            "# {} [{}, {}) {}",
                            mention.label, mention.start_token, mention.end_token, mention.text
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

fn write_encoded(
    out: &mut impl Write,
    encoder: &FeatureEncoder,
    tokens: &[String],
    pretty: bool,
) -> Result<()> {
    let features = encoder.encode(tokens);
    let output = EncodeOutput {
        tokens,
        features: &features,
    };
    if pretty {
        serde_json::to_writer_pretty(&mut *out, &output)?;
    } else {
        serde_json::to_writer(&mut *out, &output)?;
    }
    writeln!(out)?;
    Ok(())
}
