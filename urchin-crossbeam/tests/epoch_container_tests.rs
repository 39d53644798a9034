use rstest::rstest;
use serial_test::serial;
use urchin_core::common_tests::ordered_container_core_tests::*;
use urchin_core::common_tests::ordered_container_stress_tests::*;
use urchin_core::{OrderedContainer, OrderedList, SkipList};
use urchin_crossbeam::EpochReclaim;

// Trait for type-level parametrization
trait TestContainer {
    type ContainerType: OrderedContainer<u64> + Default + 'static;
}

// Marker types for each container
struct UseOrderedList;
struct UseSkipList;

impl TestContainer for UseOrderedList {
    type ContainerType = OrderedList<u64, EpochReclaim>;
}

impl TestContainer for UseSkipList {
    type ContainerType = SkipList<u64, EpochReclaim>;
}

#[rstest]
#[case::ordered_list(UseOrderedList)]
#[case::skip_list(UseSkipList)]
fn test_basic<T: TestContainer>(#[case] _type: T) {
    test_basic_operations::<T::ContainerType>();
}

#[rstest]
#[case::ordered_list(UseOrderedList)]
#[case::skip_list(UseSkipList)]
fn test_duplicate<T: TestContainer>(#[case] _type: T) {
    test_duplicate_keeps_first_value::<T::ContainerType>();
}

#[rstest]
#[case::ordered_list(UseOrderedList)]
#[case::skip_list(UseSkipList)]
fn test_round_trip<T: TestContainer>(#[case] _type: T) {
    test_add_get_round_trip::<T::ContainerType>();
}

#[rstest]
#[case::ordered_list(UseOrderedList)]
#[case::skip_list(UseSkipList)]
fn test_removed_not_observable<T: TestContainer>(#[case] _type: T) {
    test_get_after_remove::<T::ContainerType>();
}

#[rstest]
#[serial]
#[case::ordered_list(UseOrderedList)]
#[case::skip_list(UseSkipList)]
fn test_disjoint_inserts<T: TestContainer>(#[case] _type: T) {
    test_concurrent_disjoint_inserts::<T::ContainerType>();
}

#[rstest]
#[serial]
#[case::ordered_list(UseOrderedList)]
#[case::skip_list(UseSkipList)]
fn test_churn<T: TestContainer>(#[case] _type: T) {
    test_concurrent_churn_disjoint::<T::ContainerType>();
}

#[rstest]
#[serial]
#[case::ordered_list(UseOrderedList)]
#[case::skip_list(UseSkipList)]
fn test_remove_race<T: TestContainer>(#[case] _type: T) {
    test_remove_race_single_winner::<T::ContainerType>();
}

#[rstest]
#[serial]
#[case::ordered_list(UseOrderedList)]
#[case::skip_list(UseSkipList)]
fn test_add_vs_remove<T: TestContainer>(#[case] _type: T) {
    test_add_remove_race::<T::ContainerType>();
}

#[rstest]
#[serial]
#[case::ordered_list(UseOrderedList)]
#[case::skip_list(UseSkipList)]
fn test_ordering<T: TestContainer>(#[case] _type: T) {
    test_memory_ordering::<T::ContainerType>();
}

#[rstest]
#[serial]
#[case::ordered_list(UseOrderedList)]
#[case::skip_list(UseSkipList)]
fn test_linearizability<T: TestContainer>(#[case] _type: T) {
    test_linearizability_cycles::<T::ContainerType>();
}

// Priority-queue face of the skip list

#[test]
fn test_pop_smoke() {
    test_pop_min_smoke::<EpochReclaim>();
}

#[test]
#[serial]
fn test_pop_drain() {
    test_pop_min_drain::<EpochReclaim>();
}

#[test]
#[serial]
fn test_pop_producers_consumers() {
    test_producers_consumers::<EpochReclaim>();
}
