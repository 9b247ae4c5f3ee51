mod completion;
mod dump;
mod run;

#[derive(clap::Subcommand, Debug)]
pub enum Subcommand {
    /// Load a program and run it
    Run(self::run::RunOpt),

    /// Disassemble the words of a load file
    Dump(self::dump::DumpOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Self::Run(opt) => opt.exec(),
            Self::Dump(opt) => opt.exec(),
            Self::Completion(opt) => opt.exec(),
        }
    }
}

/// Read and parse a load file, refusing files with nothing to load
fn read_load_file(path: &camino::Utf8Path) -> anyhow::Result<c6461_emulator::LoadFile> {
    use anyhow::Context;

    tracing::info!(%path, "Reading load file");
    let source =
        std::fs::read_to_string(path).with_context(|| format!("could not read {path}"))?;
    let file = c6461_emulator::parse_load_file(&source);

    if file.words.is_empty() {
        anyhow::bail!("{path} does not contain any word to load");
    }

    Ok(file)
}
