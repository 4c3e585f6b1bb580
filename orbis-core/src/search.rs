//! Binary search over sorted [`DataList`]s.
//!
//! All searches are iterative with an overflow-free midpoint
//! (`lo + (hi - lo) / 2`) and return `Ok(None)` when nothing matches. With
//! duplicate keys any matching index may be returned.

use std::cmp::Ordering;

use crate::error::CollectionError;
use crate::list::DataList;

/// Searches the whole list for `value`.
///
/// # Examples
///
/// ```
/// use orbis_core::codec::LongDataType;
/// use orbis_core::{AlignedDataList, DataList, OnHeapMemory, binary_search};
///
/// # fn main() -> Result<(), orbis_core::CollectionError> {
/// let list = AlignedDataList::new(OnHeapMemory::new(64)?, LongDataType)?;
/// for value in [2, 3, 5, 7, 11] {
///     list.add(&value)?;
/// }
/// assert_eq!(binary_search(&list, &7, i64::cmp)?, Some(3));
/// assert_eq!(binary_search(&list, &4, i64::cmp)?, None);
/// # Ok(())
/// # }
/// ```
pub fn binary_search<L, C>(
    list: &L,
    value: &L::Value,
    comparator: C,
) -> Result<Option<u64>, CollectionError>
where
    L: DataList + ?Sized,
    C: Fn(&L::Value, &L::Value) -> Ordering,
{
    match list.size() {
        0 => Ok(None),
        size => binary_search_in(list, value, comparator, 0, size - 1),
    }
}

/// Searches indices `from..=to` for `value`.
pub fn binary_search_in<L, C>(
    list: &L,
    value: &L::Value,
    comparator: C,
    from: u64,
    to: u64,
) -> Result<Option<u64>, CollectionError>
where
    L: DataList + ?Sized,
    C: Fn(&L::Value, &L::Value) -> Ordering,
{
    search_by(list, from, to, |element| comparator(element, value))
}

/// Searches the whole list for the element whose extracted attribute equals
/// `attribute`.
pub fn binary_search_by_attribute<L, A, E, C>(
    list: &L,
    attribute: &A,
    extractor: E,
    comparator: C,
) -> Result<Option<u64>, CollectionError>
where
    L: DataList + ?Sized,
    E: Fn(&L::Value) -> A,
    C: Fn(&A, &A) -> Ordering,
{
    match list.size() {
        0 => Ok(None),
        size => search_by(list, 0, size - 1, |element| {
            comparator(&extractor(element), attribute)
        }),
    }
}

/// Core loop: `probe` orders an element relative to the target.
pub(crate) fn search_by<L, P>(
    list: &L,
    from: u64,
    to: u64,
    mut probe: P,
) -> Result<Option<u64>, CollectionError>
where
    L: DataList + ?Sized,
    P: FnMut(&L::Value) -> Ordering,
{
    let (mut lo, mut hi) = (from, to);
    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        match probe(&list.get(mid)?) {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater if mid == 0 => return Ok(None),
            Ordering::Greater => hi = mid - 1,
            Ordering::Equal => return Ok(Some(mid)),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{LongDataType, PairDataType};
    use crate::list::{AlignedDataList, FixedSizeDataList};
    use crate::memory::OnHeapMemory;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn primes() -> AlignedDataList<LongDataType> {
        let list = AlignedDataList::new(OnHeapMemory::new(32).expect("memory"), LongDataType)
            .expect("list");
        for value in [2, 3, 5, 7, 11, 13, 17, 19] {
            list.add(&value).expect("add");
        }
        list
    }

    #[rstest]
    #[case(2, Some(0))]
    #[case(19, Some(7))]
    #[case(1, None)]
    #[case(20, None)]
    #[case(12, None)]
    fn finds_values_in_the_whole_list(
        primes: AlignedDataList<LongDataType>,
        #[case] value: i64,
        #[case] expected: Option<u64>,
    ) {
        assert_eq!(binary_search(&primes, &value, i64::cmp).expect("search"), expected);
    }

    #[rstest]
    fn sub_ranges_are_inclusive(primes: AlignedDataList<LongDataType>) {
        assert_eq!(
            binary_search_in(&primes, &7, i64::cmp, 3, 3).expect("search"),
            Some(3)
        );
        assert_eq!(
            binary_search_in(&primes, &7, i64::cmp, 4, 7).expect("search"),
            None
        );
        assert_eq!(
            binary_search_in(&primes, &7, i64::cmp, 5, 2).expect("search"),
            None
        );
    }

    #[rstest]
    fn searches_by_extracted_attribute() {
        let codec = PairDataType::new(LongDataType, LongDataType);
        let list = FixedSizeDataList::new(OnHeapMemory::new(64).expect("memory"), codec)
            .expect("list");
        for key in [10_i64, 20, 30, 40] {
            list.add(&(key, key * 100)).expect("add");
        }
        let found = binary_search_by_attribute(&list, &30, |(key, _)| *key, i64::cmp)
            .expect("search");
        assert_eq!(found, Some(2));
    }

    #[rstest]
    fn empty_lists_find_nothing() {
        let list = AlignedDataList::new(OnHeapMemory::new(32).expect("memory"), LongDataType)
            .expect("list");
        assert_eq!(binary_search(&list, &1, i64::cmp).expect("search"), None);
    }

    proptest! {
        #[test]
        fn finds_every_present_value(mut values in prop::collection::vec(-1_000_i64..1_000, 1..200), probe in -1_000_i64..1_000) {
            values.sort_unstable();
            values.dedup();
            let list = AlignedDataList::new(OnHeapMemory::new(64).expect("memory"), LongDataType)
                .expect("list");
            for value in &values {
                list.add(value).expect("add");
            }
            let found = binary_search(&list, &probe, i64::cmp).expect("search");
            let expected = values.binary_search(&probe).ok().map(|index| index as u64);
            prop_assert_eq!(found, expected);
        }
    }
}
