//! Width reconciliation between a file's header and its specification.
//!
//! A file's declared row width is authoritative for geometry; the
//! specification's computed width is authoritative for meaning. The two
//! drift when a game update appends unknown bytes to rows before the
//! schema catches up, so:
//!
//! 1. equal widths use the specification as-is;
//! 2. a wider declaration turns the excess into opaque trailing padding,
//!    preserved verbatim through decode and re-encode;
//! 3. a narrower declaration is a hard [`Error::SpecificationMismatch`] -
//!    guessing field boundaries would corrupt heap offsets further down
//!    the row, which is worse than refusing to decode.

use std::sync::Arc;

use crate::spec::FileSpec;
use crate::{Error, Result};

/// A specification reconciled against a concrete file's row width.
#[derive(Debug, Clone)]
pub struct RowLayout {
    /// The matched specification.
    pub spec: Arc<FileSpec>,
    /// The file's declared row width; always `spec.row_width + padding`.
    pub row_width: u32,
    /// Opaque trailing bytes per row not covered by the specification.
    pub padding: u32,
}

/// Reconcile one specification against a declared row width.
pub fn match_specification(spec: &Arc<FileSpec>, declared_row_width: u32) -> Result<RowLayout> {
    if declared_row_width < spec.row_width {
        return Err(Error::SpecificationMismatch {
            file: spec.file_name.clone(),
            declared: declared_row_width,
            computed: spec.row_width,
        });
    }

    Ok(RowLayout {
        spec: Arc::clone(spec),
        row_width: declared_row_width,
        padding: declared_row_width - spec.row_width,
    })
}

/// Pick the best candidate among several specification revisions.
///
/// Candidates must be ordered newest generation first (as
/// [`crate::SpecRegistry::candidates`] returns them). An exact width match
/// is preferred over a padding match; within the same match class the
/// newest candidate wins. If nothing fits, the mismatch error reports the
/// newest candidate, since that is the one expected to be current.
pub fn select_specification(
    candidates: &[Arc<FileSpec>],
    declared_row_width: u32,
) -> Result<RowLayout> {
    let exact = candidates
        .iter()
        .find(|spec| spec.row_width == declared_row_width);
    if let Some(spec) = exact {
        return match_specification(spec, declared_row_width);
    }

    let padded = candidates
        .iter()
        .find(|spec| spec.row_width < declared_row_width);
    if let Some(spec) = padded {
        return match_specification(spec, declared_row_width);
    }

    match candidates.first() {
        Some(newest) => Err(Error::SpecificationMismatch {
            file: newest.file_name.clone(),
            declared: declared_row_width,
            computed: newest.row_width,
        }),
        None => Err(Error::UnknownFile {
            version: String::new(),
            file: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecRegistry;

    fn registry_with_widths(widths: &[(u64, u32)]) -> SpecRegistry {
        // Each (generation, n) makes a spec of n consecutive u8 fields.
        let mut registry = SpecRegistry::new();
        for (generation, n) in widths {
            let fields: Vec<String> = (0..*n)
                .map(|i| format!(r#"{{ "name": "F{}", "type": "u8" }}"#, i))
                .collect();
            let doc = format!(
                r#"{{ "version": "v", "generation": {}, "ref_width": 32,
                     "files": {{ "a.dat": {{ "fields": [{}] }} }} }}"#,
                generation,
                fields.join(",")
            );
            registry.insert_json(&doc).unwrap();
        }
        registry
    }

    #[test]
    fn test_exact_match() {
        let registry = registry_with_widths(&[(1, 4)]);
        let spec = registry.specification_for("v", "a.dat").unwrap();

        let layout = match_specification(spec, 4).unwrap();
        assert_eq!(layout.padding, 0);
        assert_eq!(layout.row_width, 4);
    }

    #[test]
    fn test_excess_becomes_padding() {
        let registry = registry_with_widths(&[(1, 4)]);
        let spec = registry.specification_for("v", "a.dat").unwrap();

        let layout = match_specification(spec, 9).unwrap();
        assert_eq!(layout.padding, 5);
    }

    #[test]
    fn test_narrow_declaration_refused() {
        let registry = registry_with_widths(&[(1, 8)]);
        let spec = registry.specification_for("v", "a.dat").unwrap();

        assert!(matches!(
            match_specification(spec, 6),
            Err(Error::SpecificationMismatch {
                declared: 6,
                computed: 8,
                ..
            })
        ));
    }

    #[test]
    fn test_select_prefers_exact_over_padding() {
        // Newest candidate is 6 wide (padding fit); older one is exactly 8.
        let registry = registry_with_widths(&[(2, 6), (1, 8)]);
        let candidates = registry.candidates("v", "a.dat");

        let layout = select_specification(candidates, 8).unwrap();
        assert_eq!(layout.spec.generation, 1);
        assert_eq!(layout.padding, 0);
    }

    #[test]
    fn test_select_ties_break_to_newest() {
        // Two revisions with the same width; generation 5 must win.
        let registry = registry_with_widths(&[(5, 4), (3, 4)]);
        let candidates = registry.candidates("v", "a.dat");

        let layout = select_specification(candidates, 4).unwrap();
        assert_eq!(layout.spec.generation, 5);
    }

    #[test]
    fn test_select_mismatch_reports_newest() {
        let registry = registry_with_widths(&[(2, 10), (1, 12)]);
        let candidates = registry.candidates("v", "a.dat");

        assert!(matches!(
            select_specification(candidates, 6),
            Err(Error::SpecificationMismatch { computed: 10, .. })
        ));
    }
}
