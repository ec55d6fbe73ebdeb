use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

// build.rs can't depend on the crate it is building, so the registry tables are
// pulled in textually.
include! {"src/iana/definitions.rs"}

/// Emit one documented `const` per entry. `entries` yields the constant name,
/// the code point for the doc line and the struct literal.
fn registry<W: Write>(
    out: &mut W,
    type_name: &str,
    entries: impl Iterator<Item = (&'static str, String, String)>,
) -> io::Result<()> {
    writeln!(out, "pub use super::{type_name};")?;
    for (name, code_point, literal) in entries {
        writeln!(out, "/// `{code_point}`")?;
        writeln!(out, "#[allow(non_upper_case_globals)]")?;
        writeln!(out, "pub const {name}: {type_name} = {literal};")?;
    }
    Ok(())
}

/// Generate a named `const` for every registry entry, so code and tests can say
/// `constants::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA` instead of looking strings up.
fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/iana/definitions.rs");

    let out_dir = std::env::var_os("OUT_DIR")
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR is not set"))?;
    let mut out = BufWriter::new(File::create(PathBuf::from(out_dir).join("iana_constants.rs"))?);

    registry(
        &mut out,
        "Cipher",
        IANA_CIPHERS.iter().map(|c| {
            let [high, low] = c.value;
            (
                c.description,
                format!("0x{high:02X},0x{low:02X}"),
                format!("Cipher {{ value: [{high}, {low}], description: {:?} }}", c.description),
            )
        }),
    )?;
    registry(
        &mut out,
        "Group",
        IANA_GROUPS.iter().map(|g| {
            (
                g.description,
                g.value.to_string(),
                format!("Group {{ value: {}, description: {:?} }}", g.value, g.description),
            )
        }),
    )?;
    registry(
        &mut out,
        "SignatureScheme",
        IANA_SIGNATURE_SCHEMES.iter().map(|s| {
            (
                s.description,
                format!("0x{:04X}", s.value),
                format!(
                    "SignatureScheme {{ value: {}, description: {:?} }}",
                    s.value, s.description
                ),
            )
        }),
    )?;
    out.flush()
}
