//! Uniform sampling from iterators of known length. Neighbor lists and the
//! node set both report their length up front, so neither needs reservoir
//! sampling.

use rand::seq::index::sample as choose_range;
use rand::Rng;

/// Sample a random element uniformly from a container of known length.
///
/// We do not assume the container is randomly indexable, only that it can be iterated over.
pub fn sample_single_from_known_length<I, R, T>(rng: &mut R, mut iter: I) -> Option<T>
where
    R: Rng,
    I: ExactSizeIterator<Item = T>,
{
    let len = iter.len();
    if len == 0 {
        return None;
    }
    let index = rng.random_range(0..len);
    iter.nth(index)
}

/// Sample `requested` elements uniformly without replacement from a container of known
/// length, preserving iteration order. Returns `None` if `requested` exceeds the length.
pub fn sample_multiple_from_known_length<I, R, T>(
    rng: &mut R,
    iter: I,
    requested: usize,
) -> Option<Vec<T>>
where
    R: Rng,
    I: ExactSizeIterator<Item = T>,
{
    let len = iter.len();
    if requested > len {
        return None;
    }
    if requested == 0 {
        return Some(Vec::new());
    }

    let mut indexes = choose_range(rng, len, requested).into_vec();
    indexes.sort_unstable();
    let mut index_iterator = indexes.into_iter().peekable();
    let mut selected = Vec::with_capacity(requested);

    for (idx, item) in iter.enumerate() {
        if index_iterator.peek() == Some(&idx) {
            selected.push(item);
            index_iterator.next();
            if index_iterator.peek().is_none() {
                break;
            }
        }
    }

    Some(selected)
}
