//! Rank, dense rank, share-of-total, and cumulative share within partitions.

use std::collections::BTreeMap;

use serde::Serialize;

/// A row that can be ranked by one numeric metric within a partition.
pub trait Rankable {
    /// Partition key. Its `Ord` is the output priority of partitions.
    type Partition: Ord;

    fn partition(&self) -> Self::Partition;
    fn metric(&self) -> f64;
    /// Stable secondary key that orders rows with equal metrics.
    fn tie_key(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow<T> {
    #[serde(flatten)]
    pub row: T,
    /// Competition rank: ties share a rank, the next value skips ahead.
    pub rank: u32,
    /// Ties share a rank, the next value is always one more.
    pub dense_rank: u32,
    pub share: f64,
    pub cumulative_share: f64,
}

pub fn rank_within_partitions<T: Rankable>(rows: Vec<T>) -> Vec<RankedRow<T>> {
    rank_by(rows, T::partition, T::metric, T::tie_key)
}

/// Ranks `rows` descending by `metric` inside each partition.
///
/// Output is ordered by partition key, then rank, then tie key. Shares
/// are 0 when the partition total is 0; non-finite metrics count as 0.
///
/// Cumulative share rises monotonically to 1 only when every metric in the
/// partition is non-negative. Negative values (net returns) rank last with
/// a negative share, so the running share overshoots 1 and falls back to it.
pub fn rank_by<T, K, P, M, S>(rows: Vec<T>, partition: P, metric: M, tie_key: S) -> Vec<RankedRow<T>>
where
    K: Ord,
    P: Fn(&T) -> K,
    M: Fn(&T) -> f64,
    S: Fn(&T) -> String,
{
    let total_rows = rows.len();
    let mut partitions: BTreeMap<K, Vec<(f64, String, T)>> = BTreeMap::new();
    for row in rows {
        let value = finite_or_zero(metric(&row));
        partitions
            .entry(partition(&row))
            .or_default()
            .push((value, tie_key(&row), row));
    }

    let mut ranked = Vec::with_capacity(total_rows);
    for (_, mut members) in partitions {
        members.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        let total: f64 = members.iter().map(|(v, _, _)| *v).sum();

        let mut running = 0.0;
        let mut rank = 0u32;
        let mut dense_rank = 0u32;
        let mut previous: Option<f64> = None;
        for (position, (value, _, row)) in members.into_iter().enumerate() {
            if previous != Some(value) {
                rank = position as u32 + 1;
                dense_rank += 1;
                previous = Some(value);
            }
            running += value;
            ranked.push(RankedRow {
                row,
                rank,
                dense_rank,
                share: ratio(value, total),
                cumulative_share: ratio(running, total),
            });
        }
    }
    ranked
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn ratio(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        part / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct ClassSales {
        department: String,
        class_name: String,
        sales: f64,
    }

    impl Rankable for ClassSales {
        type Partition = String;

        fn partition(&self) -> String {
            self.department.clone()
        }

        fn metric(&self) -> f64 {
            self.sales
        }

        fn tie_key(&self) -> String {
            self.class_name.clone()
        }
    }

    fn class(department: &str, class_name: &str, sales: f64) -> ClassSales {
        ClassSales {
            department: department.into(),
            class_name: class_name.into(),
            sales,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ties_share_rank() {
        let ranked = rank_within_partitions(vec![
            class("Home", "Bedding", 50.0),
            class("Home", "Bath", 100.0),
            class("Home", "Candles", 100.0),
        ]);
        let names: Vec<_> = ranked.iter().map(|r| r.row.class_name.as_str()).collect();
        assert_eq!(names, vec!["Bath", "Candles", "Bedding"]);
        assert_eq!(ranked.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 1, 3]);
        assert_eq!(ranked.iter().map(|r| r.dense_rank).collect::<Vec<_>>(), vec![1, 1, 2]);

        let shares: Vec<_> = ranked.iter().map(|r| r.share).collect();
        assert!(close(shares[0], 0.4) && close(shares[1], 0.4) && close(shares[2], 0.2));
        let cumulative: Vec<_> = ranked.iter().map(|r| r.cumulative_share).collect();
        assert!(close(cumulative[0], 0.4) && close(cumulative[1], 0.8));
        assert_eq!(cumulative[2], 1.0);
    }

    #[test]
    fn test_partitions_ranked_independently() {
        let ranked = rank_within_partitions(vec![
            class("Toys", "Puzzles", 5.0),
            class("Home", "Bath", 1.0),
            class("Toys", "Games", 20.0),
        ]);
        let rows: Vec<_> = ranked
            .iter()
            .map(|r| (r.row.department.as_str(), r.row.class_name.as_str(), r.rank))
            .collect();
        assert_eq!(
            rows,
            vec![("Home", "Bath", 1), ("Toys", "Games", 1), ("Toys", "Puzzles", 2)]
        );
        assert_eq!(ranked[0].share, 1.0);
    }

    #[test]
    fn test_zero_total_gives_zero_share() {
        let ranked = rank_within_partitions(vec![class("Home", "A", 0.0), class("Home", "B", 0.0)]);
        assert!(ranked.iter().all(|r| r.share == 0.0 && r.cumulative_share == 0.0));
        assert!(ranked.iter().all(|r| r.rank == 1 && r.dense_rank == 1));
    }

    #[test]
    fn test_non_finite_metric_treated_as_zero() {
        let ranked = rank_within_partitions(vec![class("Home", "A", f64::NAN), class("Home", "B", 4.0)]);
        assert_eq!(ranked[0].row.class_name, "B");
        assert_eq!(ranked[0].share, 1.0);
        assert_eq!(ranked[1].share, 0.0);
    }

    #[test]
    fn test_negative_metric_lowers_cumulative_share() {
        let ranked = rank_within_partitions(vec![
            class("Home", "Returns", -30.0),
            class("Home", "Bath", 100.0),
            class("Home", "Bedding", 50.0),
        ]);
        let names: Vec<_> = ranked.iter().map(|r| r.row.class_name.as_str()).collect();
        assert_eq!(names, vec!["Bath", "Bedding", "Returns"]);
        assert!(close(ranked[2].share, -0.25));

        let cumulative: Vec<_> = ranked.iter().map(|r| r.cumulative_share).collect();
        assert!(close(cumulative[0], 100.0 / 120.0));
        assert!(close(cumulative[1], 1.25));
        assert!(close(cumulative[2], 1.0));
        assert!(cumulative[2] < cumulative[1]);
    }

    #[test]
    fn test_rank_by_closure_metric() {
        let ranked = rank_by(
            vec![class("Home", "A", 3.0), class("Home", "B", 9.0)],
            |_| (),
            |c| -c.sales,
            |c| c.class_name.clone(),
        );
        assert_eq!(ranked[0].row.class_name, "A");
    }

    #[test]
    fn test_serializes_flat() {
        let ranked = rank_within_partitions(vec![class("Home", "A", 3.0)]);
        let json = serde_json::to_value(&ranked[0]).unwrap();
        assert_eq!(json["class_name"], "A");
        assert_eq!(json["rank"], 1);
        assert_eq!(json["cumulative_share"], 1.0);
    }
}
