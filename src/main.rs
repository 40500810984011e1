mod cli {
    use std::env;
    use std::fs;

    use anyhow::{Context, Result};
    use serde::Serialize;

    use multisample::container::{self, VendorContainer};
    use multisample::tree::{decode_tree, Chunk};
    use multisample::{CodecConfig, CodecVariant, Dialect, FormatSniffer};

    /// Printable view of a decoded chunk
    #[derive(Serialize)]
    struct ChunkSummary {
        tag: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        form_type: Option<String>,
        len: u64,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<ChunkSummary>,
    }

    impl ChunkSummary {
        fn new(chunk: &Chunk, dialect: &Dialect) -> Self {
            Self {
                tag: chunk.tag.to_string(),
                form_type: chunk.form_type().map(|t| t.to_string()),
                len: chunk.body_len(dialect),
                children: chunk
                    .children
                    .iter()
                    .map(|c| ChunkSummary::new(c, dialect))
                    .collect(),
            }
        }
    }

    fn print_json<T: Serialize>(value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn inspect_vendor(data: &[u8], config: &CodecConfig) -> Result<()> {
        let decoded = container::decode(data, config)?;
        print_json(&decoded.header())?;
        match decoded {
            VendorContainer::Legacy(legacy) => {
                print_json(&legacy.header)?;
                println!("payload: {} bytes", legacy.payload.len());
            }
            VendorContainer::Modern(modern) => {
                print_json(&ChunkSummary::new(modern.root(), &Dialect::vendor()))?;
                if modern.is_encrypted()? {
                    println!("protected by: {}", modern.protection_ids()?.join(", "));
                } else {
                    print_json(&modern.records()?)?;
                }
            }
        }
        Ok(())
    }

    fn inspect_tree(data: &[u8], dialect: &Dialect, config: &CodecConfig) -> Result<()> {
        let chunks = decode_tree(data, dialect, config)?;
        let summary: Vec<ChunkSummary> =
            chunks.iter().map(|c| ChunkSummary::new(c, dialect)).collect();
        print_json(&summary)
    }

    #[cfg(feature = "monolith")]
    fn inspect_monolith(data: &[u8], config: &CodecConfig) -> Result<()> {
        let dictionary = multisample::monolith::read_dictionary(data, config)?;
        println!("{} dictionaries", dictionary.dictionary_count());
        print_json(&dictionary.resources())
    }

    #[cfg(not(feature = "monolith"))]
    fn inspect_monolith(_data: &[u8], _config: &CodecConfig) -> Result<()> {
        anyhow::bail!("Monolith support requires the \"monolith\" feature")
    }

    pub fn run() -> Result<()> {
        let mut file_arg: Option<String> = None;
        let mut config_arg: Option<String> = None;
        let mut lenient = false;
        let mut show_help = false;

        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => show_help = true,
                "--lenient" => lenient = true,
                "--config" => match args.next() {
                    Some(path) => config_arg = Some(path),
                    None => {
                        eprintln!("--config requires a path");
                        show_help = true;
                    }
                },
                _ if arg.starts_with('-') => {
                    eprintln!("Unknown flag: {}", arg);
                    show_help = true;
                }
                _ => file_arg = Some(arg),
            }
        }

        let Some(file_path) = file_arg.filter(|_| !show_help) else {
            eprintln!(
                "Usage:\n  inspect [--lenient] [--config <codec.json>] <file>\n\nFlags:\n  --lenient            Warn instead of failing on count mismatches\n  --config <path>      Load decoder limits from a JSON file\n  -h, --help           Show this help\n"
            );
            return Ok(());
        };

        let mut config = match config_arg {
            Some(path) => {
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config '{}'", path))?;
                CodecConfig::from_json(&text)?
            }
            None => CodecConfig::default(),
        };
        if lenient {
            config.strict_counts = false;
        }

        let data =
            fs::read(&file_path).with_context(|| format!("Failed to read file '{}'", file_path))?;
        let sniffed = FormatSniffer::sniff_bytes(&data)
            .with_context(|| format!("Cannot identify '{}'", file_path))?;
        println!("{}: {} ({})", file_path, sniffed.variant, sniffed.endian);

        match sniffed.variant {
            CodecVariant::LegacyFlat(_) | CodecVariant::ChunkDictionary => {
                inspect_vendor(&data, &config)
            }
            CodecVariant::Riff => inspect_tree(&data, &Dialect::riff(), &config),
            CodecVariant::Iff => inspect_tree(&data, &Dialect::iff(), &config),
            CodecVariant::Monolith => inspect_monolith(&data, &config),
        }
        .with_context(|| format!("Failed to decode '{}'", file_path))
    }
}

fn main() -> anyhow::Result<()> {
    cli::run()
}
