/// Exclusive prefix sum: entry `n` is the sum of all counts before `n`.
///
/// ```
/// # use blockfem::util::prefix_sum;
/// assert_eq!(prefix_sum([3, 0, 2]), vec![0, 3, 3]);
/// ```
pub fn prefix_sum(counts: impl IntoIterator<Item = usize>) -> Vec<usize> {
    counts
        .into_iter()
        .scan(0, |total, count| {
            let offset = *total;
            *total += count;
            Some(offset)
        })
        .collect()
}
