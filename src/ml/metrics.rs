// ============================================================
// Layer 5 — Classification Metrics
// ============================================================
// Counts accumulated over a whole pass. Accuracy and F1 are
// computed once at the end, never averaged per batch.
//
//   precision = tp / (tp + fp)
//   recall    = tp / (tp + fn)
//   F1        = 2 * tp / (2 * tp + fp + fn)
//
// Class 1 (duplicate) is the positive class. F1 is defined as
// 0.0 when there is nothing to score (tp + fp + fn = 0).

/// Confusion counts for the positive class plus the total seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinaryCounts {
    pub true_pos:  usize,
    pub false_pos: usize,
    pub false_neg: usize,
    pub correct:   usize,
    pub total:     usize,
}

impl BinaryCounts {
    pub const POSITIVE: usize = 1;

    pub fn update(&mut self, predictions: &[usize], labels: &[usize]) {
        for (&pred, &label) in predictions.iter().zip(labels) {
            let pred_pos  = pred == Self::POSITIVE;
            let label_pos = label == Self::POSITIVE;
            match (pred_pos, label_pos) {
                (true, true)  => self.true_pos += 1,
                (true, false) => self.false_pos += 1,
                (false, true) => self.false_neg += 1,
                (false, false) => {}
            }
            if pred == label {
                self.correct += 1;
            }
            self.total += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.correct as f64 / self.total as f64 }
    }

    pub fn f1(&self) -> f64 {
        let denom = 2 * self.true_pos + self.false_pos + self.false_neg;
        if denom == 0 { 0.0 } else { (2 * self.true_pos) as f64 / denom as f64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_scores() {
        let mut counts = BinaryCounts::default();
        counts.update(&[1, 1, 0, 0], &[1, 0, 1, 0]);
        counts.update(&[1], &[1]);

        assert_eq!(counts.true_pos, 2);
        assert_eq!(counts.false_pos, 1);
        assert_eq!(counts.false_neg, 1);
        assert_eq!(counts.total, 5);
        assert!((counts.accuracy() - 0.6).abs() < 1e-12);
        // 2*2 / (4 + 1 + 1)
        assert!((counts.f1() - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_positives_gives_zero_f1() {
        let mut counts = BinaryCounts::default();
        counts.update(&[0, 0], &[0, 0]);
        assert_eq!(counts.f1(), 0.0);
        assert_eq!(counts.accuracy(), 1.0);
        assert_eq!(BinaryCounts::default().accuracy(), 0.0);
    }
}
