use anyhow::{Context as _, Result};
use declarative::{Emulator, EmulatorEnv};
use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Read};

/// Declare one object from the environment the manifest runs in.
pub fn run(type_name: &str, args: &[String]) -> Result<()> {
    let vars: BTreeMap<String, String> = std::env::vars().collect();
    let env = EmulatorEnv::from_vars(&vars).context("Not running inside a manifest")?;
    let emulator = Emulator::new(env);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdin: Option<&mut dyn Read> = if input.is_terminal() {
        None
    } else {
        Some(&mut input)
    };

    let object = emulator
        .run(type_name, args, stdin)
        .with_context(|| format!("{type_name}: could not declare object"))?;
    log::trace!("Emulated {}", object.name());
    Ok(())
}
