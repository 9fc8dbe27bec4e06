use std::fmt::Write;

use crate::{Error, Result};

/// One line of `cfm-predict` input.
#[derive(Clone, Debug, PartialEq)]
pub struct Molecule {
    pub id: String,
    pub smiles: String,
}

impl Molecule {
    pub fn new(id: impl Into<String>, smiles: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            smiles: smiles.into(),
        }
    }
}

/// load molecules from an uploaded batch file. each non-blank, non-comment line
/// is either `<id> <smiles>` or a bare SMILES, in which case the id is `M<n>`
/// for the `n`th accepted line, counting from 1. returns [Error::NoMolecules]
/// if nothing usable was found
pub fn load_molecules(s: &str) -> Result<Vec<Molecule>> {
    let mols: Vec<_> = s
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .filter_map(|(i, line)| {
            let parts: Vec<_> = line.split_whitespace().collect();
            let (first, rest) = parts.split_first()?;
            Some(if rest.is_empty() {
                Molecule::new(format!("M{}", i + 1), *first)
            } else {
                Molecule::new(*first, rest.join(" "))
            })
        })
        .collect();
    if mols.is_empty() {
        return Err(Error::NoMolecules);
    }
    Ok(mols)
}

/// render `mols` in the `<id> <smiles>` format read by `cfm-predict`
pub fn to_input(mols: &[Molecule]) -> String {
    let mut ret = String::new();
    for Molecule { id, smiles } in mols {
        writeln!(ret, "{id} {smiles}").unwrap();
    }
    ret
}
