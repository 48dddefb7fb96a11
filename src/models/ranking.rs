//! Top-k cluster ranking engine

use crate::dataset::RecordBatch;
use crate::error::{PipelineError, Result};
use crate::models::loader::LoadedModel;
use crate::types::{OutputTable, RankedResultRow};
use chrono::NaiveDateTime;
use ndarray::ArrayView2;
use std::cmp::Ordering;
use tracing::{debug, info};

/// Descending probability order; NaN sorts after every real value and
/// `-0.0 == 0.0`.
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Labels of the `k` most probable classes, most probable first.
///
/// Equal probabilities keep the order of `classes`: the class position is an
/// explicit secondary sort key, so the result does not depend on sort
/// stability. `k` larger than the number of classes returns every class.
pub fn rank_top_k<L: Clone>(probabilities: &[f64], classes: &[L], k: usize) -> Result<Vec<L>> {
    if k == 0 {
        return Err(PipelineError::InvalidTopK(k));
    }
    if probabilities.len() != classes.len() {
        return Err(PipelineError::shape(
            format!("{} probabilities (one per class)", classes.len()),
            format!("{} probabilities", probabilities.len()),
        ));
    }

    let mut ranked: Vec<(usize, f64)> = probabilities.iter().copied().enumerate().collect();
    ranked.sort_by(|(ia, pa), (ib, pb)| descending(*pa, *pb).then_with(|| ia.cmp(ib)));

    Ok(ranked
        .into_iter()
        .take(k)
        .map(|(idx, _)| classes[idx].clone())
        .collect())
}

/// Rank every row of `probabilities` and attach the run date and record id.
///
/// Row `i` of the result belongs to `ids[i]`; records are never reordered.
pub fn build_result_rows(
    probabilities: ArrayView2<'_, f64>,
    classes: &[String],
    ids: &[String],
    run_at: NaiveDateTime,
    k: usize,
) -> Result<Vec<RankedResultRow>> {
    if probabilities.nrows() != ids.len() {
        return Err(PipelineError::shape(
            format!("{} probability rows (one per id)", ids.len()),
            format!("{} rows", probabilities.nrows()),
        ));
    }
    if probabilities.ncols() != classes.len() {
        return Err(PipelineError::shape(
            format!("{} probability columns (one per class)", classes.len()),
            format!("{} columns", probabilities.ncols()),
        ));
    }

    probabilities
        .outer_iter()
        .zip(ids)
        .map(|(row, id)| {
            let row = row.to_vec();
            let clusters = rank_top_k(&row, classes, k)?;
            Ok(RankedResultRow::new(run_at, id.clone(), clusters))
        })
        .collect()
}

/// Scores record batches against a loaded model
#[derive(Debug, Clone)]
pub struct RankingEngine {
    top_k: usize,
}

impl RankingEngine {
    pub fn new(top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(PipelineError::InvalidTopK(top_k));
        }
        Ok(Self { top_k })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Score `batch` with `model` and rank each record's clusters.
    ///
    /// Feature alignment happens before the model is invoked, so a batch
    /// missing a required column fails without producing any output.
    pub fn score(
        &self,
        model: &LoadedModel,
        batch: &RecordBatch,
        run_at: NaiveDateTime,
    ) -> Result<OutputTable> {
        let features = batch.feature_matrix(model.features())?;
        if batch.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }
        let ids = batch.ids()?;

        debug!(
            model = %model.name,
            source = %batch.source().display(),
            rows = features.nrows(),
            features = features.ncols(),
            "Scoring record batch"
        );

        let probabilities = model.classifier.predict_proba(features.view())?;
        let classes = model.classes();
        let rows = build_result_rows(probabilities.view(), classes, &ids, run_at, self.top_k)?;

        info!(
            model = %model.name,
            rows = rows.len(),
            top_k = self.top_k,
            "Scoring done"
        );

        Ok(OutputTable::new(self.top_k.min(classes.len()), rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn run_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rank_descending() {
        let ranked = rank_top_k(&[0.1, 0.6, 0.3], &["a", "b", "c"], 3).unwrap();
        assert_eq!(ranked, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_random_rows_rank_strictly_descending() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let n = rng.gen_range(1..=12);
            let k = rng.gen_range(1..=15);
            let probs: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
            let classes: Vec<usize> = (0..n).collect();

            let ranked = rank_top_k(&probs, &classes, k).unwrap();
            assert_eq!(ranked.len(), k.min(n));
            for pair in ranked.windows(2) {
                assert!(probs[pair[0]] > probs[pair[1]]);
            }
        }
    }

    #[test]
    fn test_ties_keep_declared_order() {
        for _ in 0..100 {
            let ranked = rank_top_k(&[0.5, 0.5, 0.1], &["A", "B", "C"], 2).unwrap();
            assert_eq!(ranked, vec!["A", "B"]);
        }
        let ranked = rank_top_k(&[0.2, 0.4, 0.4, 0.0], &["w", "x", "y", "z"], 4).unwrap();
        assert_eq!(ranked, vec!["x", "y", "w", "z"]);
    }

    #[test]
    fn test_length_is_min_of_k_and_classes() {
        let probs = [0.3, 0.2, 0.5];
        let classes = ["a", "b", "c"];
        for k in 1..=6 {
            let ranked = rank_top_k(&probs, &classes, k).unwrap();
            assert_eq!(ranked.len(), k.min(classes.len()));
        }
    }

    #[test]
    fn test_rank_errors() {
        assert!(matches!(
            rank_top_k(&[0.5, 0.5], &["a", "b", "c"], 1),
            Err(PipelineError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            rank_top_k(&[0.5, 0.5], &["a", "b"], 0),
            Err(PipelineError::InvalidTopK(0))
        ));
    }

    #[test]
    fn test_nan_ranks_last_and_signed_zero_ties() {
        let ranked = rank_top_k(&[f64::NAN, 0.1, 0.9], &["n", "lo", "hi"], 3).unwrap();
        assert_eq!(ranked, vec!["hi", "lo", "n"]);

        let ranked = rank_top_k(&[0.0, -0.0], &["pos", "neg"], 2).unwrap();
        assert_eq!(ranked, vec!["pos", "neg"]);
        let ranked = rank_top_k(&[-0.0, 0.0], &["neg", "pos"], 2).unwrap();
        assert_eq!(ranked, vec!["neg", "pos"]);
    }

    #[test]
    fn test_build_rows_end_to_end_scenario() {
        let probabilities = array![[0.7, 0.2, 0.1], [0.1, 0.1, 0.8]];
        let rows = build_result_rows(
            probabilities.view(),
            &labels(&["X", "Y", "Z"]),
            &labels(&["c1", "c2"]),
            run_at(),
            3,
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values(), vec!["15/01/2024", "c1", "X", "Y", "Z"]);
        assert_eq!(rows[1].values(), vec!["15/01/2024", "c2", "Z", "X", "Y"]);
    }

    #[test]
    fn test_build_rows_preserves_record_order() {
        let probabilities = array![[0.1, 0.9], [0.8, 0.2], [0.5, 0.5]];
        let ids = labels(&["r3", "r1", "r2"]);
        let rows =
            build_result_rows(probabilities.view(), &labels(&["a", "b"]), &ids, run_at(), 1)
                .unwrap();

        let out_ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(out_ids, vec!["r3", "r1", "r2"]);
        let mains: Vec<Option<&str>> = rows.iter().map(|r| r.main_cluster()).collect();
        assert_eq!(mains, vec![Some("b"), Some("a"), Some("a")]);
    }

    #[test]
    fn test_build_rows_is_deterministic() {
        let probabilities = array![[0.25, 0.25, 0.5], [0.4, 0.4, 0.2]];
        let classes = labels(&["0", "1", "2"]);
        let ids = labels(&["a", "b"]);

        let first = build_result_rows(probabilities.view(), &classes, &ids, run_at(), 2).unwrap();
        let second = build_result_rows(probabilities.view(), &classes, &ids, run_at(), 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_rows_shape_checks() {
        let probabilities = array![[0.7, 0.3]];
        let err = build_result_rows(
            probabilities.view(),
            &labels(&["a", "b"]),
            &labels(&["c1", "c2"]),
            run_at(),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { .. }));

        let err = build_result_rows(
            probabilities.view(),
            &labels(&["a", "b", "c"]),
            &labels(&["c1"]),
            run_at(),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_engine_rejects_zero_k() {
        assert!(matches!(
            RankingEngine::new(0),
            Err(PipelineError::InvalidTopK(0))
        ));
        assert_eq!(RankingEngine::new(3).unwrap().top_k(), 3);
    }
}
