//! Coordinated merge-join of two id-sorted record sequences.
//!
//! Both inputs must be strictly ascending by [`Keyed::key`] (byte-wise
//! string order). This is a precondition of the dataset files and is not
//! checked: unsorted input silently drops matches.

use std::cmp::Ordering;

/// A record with a join key.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Result of advancing the join by one match.
#[derive(Debug, PartialEq)]
pub enum Step<L, R> {
    Matched(L, R),
    /// One side ran out of records; no further matches are possible.
    Exhausted,
}

/// Two-cursor merge-join over fallible sequences.
///
/// Yields `(left, right)` for every key present in both inputs. Records
/// whose key appears on only one side are skipped. The first error from
/// either side is yielded once, after which the join is finished.
pub struct MergeJoin<L, R> {
    left: L,
    right: R,
    finished: bool,
}

/// Joins `left` and `right` on their keys.
pub fn merge_join<L, R>(left: L, right: R) -> MergeJoin<L::IntoIter, R::IntoIter>
where
    L: IntoIterator,
    R: IntoIterator,
{
    MergeJoin {
        left: left.into_iter(),
        right: right.into_iter(),
        finished: false,
    }
}

impl<L, R, A, B, E> MergeJoin<L, R>
where
    L: Iterator<Item = Result<A, E>>,
    R: Iterator<Item = Result<B, E>>,
    A: Keyed,
    B: Keyed,
{
    /// Advances both cursors to the next pair of records with equal keys.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by either input.
    pub fn step(&mut self) -> Result<Step<A, B>, E> {
        if self.finished {
            return Ok(Step::Exhausted);
        }
        let step = self.advance();
        if !matches!(step, Ok(Step::Matched(..))) {
            self.finished = true;
        }
        step
    }

    fn advance(&mut self) -> Result<Step<A, B>, E> {
        let Some(mut left) = self.left.next().transpose()? else {
            return Ok(Step::Exhausted);
        };
        let Some(mut right) = self.right.next().transpose()? else {
            return Ok(Step::Exhausted);
        };

        loop {
            match left.key().cmp(right.key()) {
                Ordering::Equal => return Ok(Step::Matched(left, right)),
                Ordering::Less => match self.left.next().transpose()? {
                    Some(next) => left = next,
                    None => return Ok(Step::Exhausted),
                },
                Ordering::Greater => match self.right.next().transpose()? {
                    Some(next) => right = next,
                    None => return Ok(Step::Exhausted),
                },
            }
        }
    }
}

impl<L, R, A, B, E> Iterator for MergeJoin<L, R>
where
    L: Iterator<Item = Result<A, E>>,
    R: Iterator<Item = Result<B, E>>,
    A: Keyed,
    B: Keyed,
{
    type Item = Result<(A, B), E>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Step::Matched(left, right)) => Some(Ok((left, right))),
            Ok(Step::Exhausted) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Rec(&'static str, u32);

    impl Keyed for Rec {
        fn key(&self) -> &str {
            self.0
        }
    }

    fn ok(recs: &[Rec]) -> Vec<Result<Rec, String>> {
        recs.iter().cloned().map(Ok).collect()
    }

    fn joined_keys(left: &[Rec], right: &[Rec]) -> Vec<&'static str> {
        merge_join(ok(left), ok(right))
            .map(|pair| pair.unwrap().0 .0)
            .collect()
    }

    #[test]
    fn unmatched_left_ids_are_dropped() {
        let titles = [Rec("1", 0), Rec("2", 0), Rec("3", 0)];
        let ratings = [Rec("2", 71), Rec("3", 84)];
        assert_eq!(joined_keys(&titles, &ratings), ["2", "3"]);
    }

    #[test]
    fn unmatched_right_ids_are_dropped() {
        let titles = [Rec("2", 0), Rec("4", 0)];
        let ratings = [Rec("1", 1), Rec("2", 2), Rec("3", 3), Rec("4", 4), Rec("5", 5)];
        assert_eq!(joined_keys(&titles, &ratings), ["2", "4"]);
    }

    #[test]
    fn interleaved_gaps_on_both_sides() {
        let titles = [Rec("a", 0), Rec("c", 0), Rec("d", 0), Rec("f", 0)];
        let ratings = [Rec("b", 0), Rec("c", 0), Rec("e", 0), Rec("f", 0), Rec("g", 0)];
        assert_eq!(joined_keys(&titles, &ratings), ["c", "f"]);
    }

    #[test]
    fn joined_pair_carries_both_records() {
        let pairs: Vec<(Rec, Rec)> = merge_join(ok(&[Rec("tt1", 1)]), ok(&[Rec("tt1", 2)]))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pairs, vec![(Rec("tt1", 1), Rec("tt1", 2))]);
    }

    #[test]
    fn empty_side_reports_exhausted() {
        let mut join = merge_join(ok(&[]), ok(&[Rec("1", 0)]));
        assert_eq!(join.step(), Ok(Step::Exhausted));
        assert_eq!(join.step(), Ok(Step::Exhausted));
    }

    #[test]
    fn error_is_yielded_once_then_join_ends() {
        let left: Vec<Result<Rec, String>> =
            vec![Ok(Rec("1", 0)), Err("bad gzip".to_string()), Ok(Rec("3", 0))];
        let right = ok(&[Rec("2", 0), Rec("3", 0)]);
        let results: Vec<Result<(Rec, Rec), String>> = merge_join(left, right).collect();
        assert_eq!(results, vec![Err("bad gzip".to_string())]);
    }

    #[test]
    fn lexicographic_ids_of_equal_width_join_in_order() {
        let titles = [Rec("tt0000009", 0), Rec("tt0000010", 0), Rec("tt0000100", 0)];
        let ratings = [Rec("tt0000010", 0), Rec("tt0000100", 0)];
        assert_eq!(joined_keys(&titles, &ratings), ["tt0000010", "tt0000100"]);
    }
}
