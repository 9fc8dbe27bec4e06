//! parsing of the text output written by `cfm-predict`. the format is a
//! sequence of records like
//!
//! ```text
//! #ID=M1
//! #SMILES=CCO
//! #InChiKey=LFQSCWFLJHTTHZ-UHFFFAOYSA-N
//! #Formula=C2H6O
//! #PMass=47.04914
//! energy0
//! 47.04914 100.00 0 (47.04914)
//! 29.03858 12.50 2 (29.03858)
//! energy1
//! ...
//! ```
//!
//! the producer is trusted, so the parser is lenient: any line it doesn't
//! understand is skipped rather than reported

use std::{
    io::{self, BufRead},
    sync::LazyLock,
};

use log::trace;
use regex::Regex;

/// the first parenthesized group on a fragment line. the content has to be
/// non-empty, so `()` is skipped in favor of a later match
static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)").unwrap());

/// The predicted spectrum of a single input molecule.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PredictionResult {
    pub id: String,
    pub smiles: Option<String>,
    pub inchikey: Option<String>,
    pub formula: Option<String>,
    pub parent_mass: Option<String>,

    /// fragments in the order they were read, which is grouped by energy level
    /// since each level's peaks follow its `energy<N>` marker
    pub fragments: Vec<Fragment>,
}

impl PredictionResult {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            ..Default::default()
        }
    }
}

/// A single predicted peak.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub energy_level: u64,
    pub mz: f64,
    pub intensity: f64,
    pub fragment_id: i64,

    /// the text inside the first pair of parentheses after the fragment id,
    /// or an empty string if there wasn't one
    pub annotation: String,
}

/// the cursor state threaded through the scan: the record currently being
/// filled in and the energy level that new fragments are assigned to
#[derive(Default)]
struct Parser {
    results: Vec<PredictionResult>,
    current: Option<PredictionResult>,
    energy: Option<u64>,
}

impl Parser {
    fn line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            self.metadata(line);
        } else if let Some(level) = line.strip_prefix("energy") {
            if let Ok(level) = level.parse::<i64>() {
                // a negative level is as good as no level at all
                self.energy = u64::try_from(level).ok();
            }
        } else {
            self.fragment(line);
        }
    }

    fn metadata(&mut self, line: &str) {
        if let Some(id) = line.strip_prefix("#ID=") {
            self.finalize();
            self.current = Some(PredictionResult::new(id));
            self.energy = None;
            return;
        }
        let Some(cur) = self.current.as_mut() else {
            return;
        };
        if let Some(s) = line.strip_prefix("#SMILES=") {
            cur.smiles = Some(s.to_owned());
        } else if let Some(s) = line.strip_prefix("#InChiKey=") {
            cur.inchikey = Some(s.to_owned());
        } else if let Some(s) = line.strip_prefix("#Formula=") {
            cur.formula = Some(s.to_owned());
        } else if let Some(s) = line.strip_prefix("#PMass=") {
            cur.parent_mass = Some(s.to_owned());
        }
    }

    fn fragment(&mut self, line: &str) {
        let Some(frag) = parse_fragment(line, self.energy) else {
            trace!("skipping line `{line}`");
            return;
        };
        if let Some(cur) = self.current.as_mut() {
            cur.fragments.push(frag);
        }
    }

    fn finalize(&mut self) {
        if let Some(cur) = self.current.take() {
            if !cur.id.is_empty() {
                self.results.push(cur);
            }
        }
    }

    fn finish(mut self) -> Vec<PredictionResult> {
        self.finalize();
        self.results
    }
}

/// parse a line of the form `<mz> <intensity> <fragment_id> [(<annotation>)]`
/// into a [Fragment] at `energy`. returns `None` if the line doesn't have that
/// form or if no energy level is set
fn parse_fragment(line: &str, energy: Option<u64>) -> Option<Fragment> {
    let energy_level = energy?;
    let parts: Vec<_> = line.split_whitespace().collect();
    let [mz, intensity, fragment_id, rest @ ..] = parts.as_slice() else {
        return None;
    };
    let mz = mz.parse().ok()?;
    let intensity = intensity.parse().ok()?;
    let fragment_id = fragment_id.parse().ok()?;
    let annotation = if rest.is_empty() {
        String::new()
    } else {
        ANNOTATION
            .captures(line)
            .map(|c| c[1].to_owned())
            .unwrap_or_default()
    };
    Some(Fragment {
        energy_level,
        mz,
        intensity,
        fragment_id,
        annotation,
    })
}

/// parse the full output of `cfm-predict` from `reader`. the only error
/// returned is a failure to read from `reader`, in which case any results
/// collected so far are discarded. invalid UTF-8 is replaced rather than
/// reported, so at worst it spoils the line it appears on
pub fn parse(mut reader: impl BufRead) -> io::Result<Vec<PredictionResult>> {
    let mut parser = Parser::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        parser.line(&String::from_utf8_lossy(&buf));
    }
    Ok(parser.finish())
}

/// like [parse] but for output that is already in memory, where reading can't
/// fail
pub fn parse_str(s: &str) -> Vec<PredictionResult> {
    let mut parser = Parser::default();
    for line in s.lines() {
        parser.line(line);
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Read};

    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn empty() {
        assert!(parse_str("").is_empty());
        assert!(parse_str("# just a comment\n\n#another\n").is_empty());
    }

    #[test]
    fn worked_example() {
        let got = parse_str("#ID=M1\n#SMILES=CCO\nenergy0\n31.0 100.0 1 (31.0)\n");
        let want = vec![PredictionResult {
            id: "M1".to_owned(),
            smiles: Some("CCO".to_owned()),
            fragments: vec![Fragment {
                energy_level: 0,
                mz: 31.0,
                intensity: 100.0,
                fragment_id: 1,
                annotation: "31.0".to_owned(),
            }],
            ..Default::default()
        }];
        assert_eq!(got, want);
    }

    #[test]
    fn metadata() {
        let got = parse_str(
            "#ID=M1
#SMILES=CCO
#InChiKey=LFQSCWFLJHTTHZ-UHFFFAOYSA-N
#Formula=C2H6O
#PMass=47.04914
#Something=else
",
        );
        assert_eq!(got.len(), 1);
        let r = &got[0];
        assert_eq!(r.smiles.as_deref(), Some("CCO"));
        assert_eq!(r.inchikey.as_deref(), Some("LFQSCWFLJHTTHZ-UHFFFAOYSA-N"));
        assert_eq!(r.formula.as_deref(), Some("C2H6O"));
        assert_eq!(r.parent_mass.as_deref(), Some("47.04914"));
        assert!(r.fragments.is_empty());
    }

    #[test]
    fn metadata_before_id() {
        let got = parse_str("#SMILES=CCO\n#ID=M1\n");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].smiles, None);
    }

    #[test]
    fn consecutive_ids() {
        let got = parse_str("#ID=X\n#ID=Y\n");
        let ids: Vec<_> = got.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["X", "Y"]);
        assert!(got.iter().all(|r| r.fragments.is_empty()));
    }

    #[test]
    fn empty_id_dropped() {
        let got = parse_str("#ID=\nenergy0\n1.0 2.0 3\n#ID=Y\n");
        let ids: Vec<_> = got.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["Y"]);
    }

    #[test]
    fn fragment_before_energy() {
        let got = parse_str("#ID=M1\n31.0 100.0 1\nenergy2\n15.0 50.0 2\n");
        assert_eq!(got[0].fragments.len(), 1);
        assert_eq!(got[0].fragments[0].energy_level, 2);
        assert_eq!(got[0].fragments[0].fragment_id, 2);
    }

    #[test]
    fn fragment_before_id() {
        let got = parse_str("energy0\n31.0 100.0 1\n#ID=M1\n");
        assert_eq!(got.len(), 1);
        assert!(got[0].fragments.is_empty());
    }

    #[test]
    fn energy_reset_by_id() {
        let got = parse_str(
            "#ID=A\nenergy1\n1.0 1.0 1\n#ID=B\n2.0 2.0 2\nenergy0\n3.0 3.0 3\n",
        );
        assert_eq!(got[0].fragments.len(), 1);
        assert_eq!(got[1].fragments.len(), 1);
        assert_eq!(got[1].fragments[0].fragment_id, 3);
    }

    #[test]
    fn bad_energy_keeps_level() {
        let got =
            parse_str("#ID=A\nenergy1\nenergyX\n1.0 1.0 1\nenergy-1\n2.0 2.0 2\n");
        assert_eq!(got[0].fragments.len(), 1);
        assert_eq!(got[0].fragments[0].energy_level, 1);
    }

    #[test]
    fn large_energy() {
        let got = parse_str("#ID=A\nenergy1\nenergy4294967296\n1.0 1.0 1\n");
        assert_eq!(got[0].fragments.len(), 1);
        assert_eq!(got[0].fragments[0].energy_level, 4_294_967_296);

        // too big for any integer, so the previous level stays
        let got = parse_str(
            "#ID=A\nenergy2\nenergy99999999999999999999\n1.0 1.0 1\n",
        );
        assert_eq!(got[0].fragments[0].energy_level, 2);
    }

    #[test]
    fn annotation() {
        let got = parse_str(
            "#ID=M1
energy0
55.05423 11.21 19 (9.1697)
55.05423 11.21 19
57.07 3.5 20 4.1 (12.3 45.6)
58.0 1.0 21 junk
",
        );
        let frags = &got[0].fragments;
        assert_eq!(frags.len(), 4);

        assert_abs_diff_eq!(frags[0].mz, 55.05423);
        assert_abs_diff_eq!(frags[0].intensity, 11.21);
        assert_eq!(frags[0].fragment_id, 19);
        assert_eq!(frags[0].annotation, "9.1697");

        assert_eq!(frags[1].annotation, "");
        assert_eq!(frags[2].annotation, "12.3 45.6");
        assert_eq!(frags[3].annotation, "");
    }

    #[test]
    fn malformed_fragments() {
        let got = parse_str(
            "#ID=M1
energy0
1.0 2.0
x 2.0 3
1.0 y 3
1.0 2.0 3.5
  4.0   5.0   6
",
        );
        let frags = &got[0].fragments;
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].fragment_id, 6);
    }

    #[test]
    fn order_preserved() {
        let got = parse_str(
            "#ID=M1
energy0
1.0 1.0 1
2.0 1.0 2
energy1
3.0 1.0 3
energy2
4.0 1.0 4
#ID=M2
energy0
5.0 1.0 5
",
        );
        let ids: Vec<_> = got
            .iter()
            .flat_map(|r| r.fragments.iter().map(|f| f.fragment_id))
            .collect();
        assert_eq!(ids, [1, 2, 3, 4, 5]);
        let levels: Vec<_> =
            got[0].fragments.iter().map(|f| f.energy_level).collect();
        assert_eq!(levels, [0, 0, 1, 2]);
    }

    #[test]
    fn reader_matches_str() {
        let input = "#ID=M1\n#SMILES=CCO\nenergy0\n31.0 100.0 1 (31.0)\n";
        let got = parse(BufReader::new(input.as_bytes())).unwrap();
        assert_eq!(got, parse_str(input));
    }

    #[test]
    fn invalid_utf8_line() {
        let input: &[u8] =
            b"#ID=A\nenergy0\n1.0 1.0 1\n#Comment=\xff\xfe\n2.0 2.0 2\r\n3.0 \xff 3\n";
        let got = parse(BufReader::new(input)).unwrap();
        assert_eq!(got.len(), 1);
        let ids: Vec<_> = got[0].fragments.iter().map(|f| f.fragment_id).collect();
        assert_eq!(ids, [1, 2]);
    }

    /// a reader that yields one valid record and then fails
    struct Failing(bool);

    impl Read for Failing {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0 {
                return Err(io::Error::other("boom"));
            }
            self.0 = true;
            let s = b"#ID=M1\nenergy0\n1.0 2.0 3\n";
            buf[..s.len()].copy_from_slice(s);
            Ok(s.len())
        }
    }

    #[test]
    fn read_error() {
        let err = parse(BufReader::new(Failing(false))).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
