use camino::Utf8PathBuf;
use clap::{Parser, ValueHint};
use tracing::debug;

use c6461_emulator::decode;

#[derive(Parser, Debug)]
pub struct DumpOpt {
    /// Load file, with one octal `<address> <value>` pair per line
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,
}

impl DumpOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let file = super::read_load_file(&self.input)?;

        debug!(words = file.words.len(), "Disassembling");
        for &(address, value) in &file.words {
            match decode(value) {
                Ok(instruction) => println!("{address:04o}  {value:06o}  {instruction}"),
                Err(e) => println!("{address:04o}  {value:06o}  ; {e}"),
            }
        }

        Ok(())
    }
}
