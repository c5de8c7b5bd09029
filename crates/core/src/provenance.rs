//! Provenance of derived values
//!
//! A derived value owns a [`Provenance`] arena holding every snapshot it was
//! derived from, oldest first. When a derived value is itself derived again,
//! its arena is moved into the new value and the value is appended, so the
//! chain stays flat and only ever points backwards.

/// One predecessor snapshot and the reason the next value was derived from it.
#[derive(Debug, Clone)]
pub struct Derivation<T> {
    pub value: T,
    pub remarks: Option<String>,
}

/// Backward chain of the snapshots a value was derived from.
#[derive(Debug, Clone)]
pub struct Provenance<T> {
    derivations: Vec<Derivation<T>>,
}

/// Values that can record what they were derived from.
pub trait Derivable: Sized {
    fn provenance(&self) -> Option<&Provenance<Self>>;

    fn provenance_mut(&mut self) -> &mut Option<Provenance<Self>>;

    /// Position this value would get if it were derived again.
    fn next_position(&self) -> usize {
        self.provenance().map(|p| p.position() + 1).unwrap_or(0)
    }
}

impl<T: Derivable> Provenance<T> {
    /// Builds the provenance for a value derived from `predecessor`.
    ///
    /// The predecessor's own arena is taken over, so `position` of the result
    /// is the predecessor's position plus one, or 0 when it had none.
    pub fn derive(mut predecessor: T, remarks: Option<String>) -> Self {
        let mut provenance = predecessor
            .provenance_mut()
            .take()
            .unwrap_or_else(|| Provenance {
                derivations: Vec::new(),
            });
        provenance.derivations.push(Derivation {
            value: predecessor,
            remarks,
        });
        provenance
    }
}

impl<T> Provenance<T> {
    /// Immediate predecessor.
    pub fn from(&self) -> &T {
        &self.last().value
    }

    /// Why the current value was derived from its immediate predecessor.
    pub fn remarks(&self) -> Option<&str> {
        self.last().remarks.as_deref()
    }

    /// 0 for the first derivation, then one more for each further step.
    pub fn position(&self) -> usize {
        self.derivations.len() - 1
    }

    /// The first snapshot of the chain.
    pub fn origin(&self) -> &T {
        &self.derivations[0].value
    }

    /// Predecessors from the most recent back to the origin.
    pub fn lineage(&self) -> impl Iterator<Item = &Derivation<T>> {
        self.derivations.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.derivations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.derivations.is_empty()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.derivations.iter_mut().map(|d| &mut d.value)
    }

    fn last(&self) -> &Derivation<T> {
        // A provenance is only ever built by `derive`, which pushes one entry.
        &self.derivations[self.derivations.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Label {
        text: String,
        provenance: Option<Provenance<Label>>,
    }

    impl Label {
        fn new(text: &str) -> Self {
            Self {
                text: text.to_string(),
                provenance: None,
            }
        }

        fn rewrite(self, text: &str, remarks: &str) -> Self {
            Self {
                text: text.to_string(),
                provenance: Some(Provenance::derive(self, Some(remarks.to_string()))),
            }
        }
    }

    impl Derivable for Label {
        fn provenance(&self) -> Option<&Provenance<Self>> {
            self.provenance.as_ref()
        }

        fn provenance_mut(&mut self) -> &mut Option<Provenance<Self>> {
            &mut self.provenance
        }
    }

    #[test]
    fn test_first_derivation_has_position_zero() {
        let original = Label::new(" a\nb ");
        assert_eq!(original.next_position(), 0);

        let trimmed = original.rewrite("a b", "trimmed");
        let provenance = trimmed.provenance().unwrap();
        assert_eq!(provenance.position(), 0);
        assert_eq!(provenance.from().text, " a\nb ");
        assert_eq!(provenance.remarks(), Some("trimmed"));
    }

    #[test]
    fn test_position_increments_along_the_chain() {
        let label = Label::new("x | Site")
            .rewrite("x", "standardized")
            .rewrite("X", "uppercased");

        let provenance = label.provenance().unwrap();
        assert_eq!(provenance.position(), 1);
        assert_eq!(provenance.from().text, "x");
        assert_eq!(provenance.origin().text, "x | Site");
        assert_eq!(label.next_position(), 2);
    }

    #[test]
    fn test_predecessors_do_not_nest_provenance() {
        let label = Label::new("a").rewrite("b", "1").rewrite("c", "2");
        let provenance = label.provenance().unwrap();

        assert!(provenance.lineage().all(|d| d.value.provenance.is_none()));
        let texts: Vec<_> = provenance.lineage().map(|d| d.value.text.as_str()).collect();
        assert_eq!(texts, ["b", "a"]);
    }
}
