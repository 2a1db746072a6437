use serde::Serialize;

/// Machine-parseable YAML on stdout, for `--format yaml` consumers.
pub fn print_yaml<T: Serialize>(data: &T) -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(data)?);
    Ok(())
}
