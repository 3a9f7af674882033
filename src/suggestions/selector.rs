use std::collections::HashSet;

use rand::seq::index;
use rand::Rng;

use crate::foods::model::{CatalogFoodItem, PersonalFoodItem};

pub fn owned_names(personal: &[PersonalFoodItem]) -> HashSet<String> {
    personal.iter().map(|item| item.name.clone()).collect()
}

/// Drops catalog items the user already owns (exact, case-sensitive name
/// match) and draws up to `sample_size` of the rest uniformly without
/// replacement.
pub fn select_sample<R>(
    page_items: &[CatalogFoodItem],
    owned_names: &HashSet<String>,
    sample_size: usize,
    rng: &mut R,
) -> Vec<CatalogFoodItem>
where
    R: Rng + ?Sized,
{
    let remaining: Vec<&CatalogFoodItem> = page_items
        .iter()
        .filter(|item| !owned_names.contains(&item.name))
        .collect();

    let amount = sample_size.min(remaining.len());
    index::sample(rng, remaining.len(), amount)
        .into_iter()
        .map(|i| remaining[i].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foods::model::{EatingType, FoodType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn page(n: usize) -> Vec<CatalogFoodItem> {
        (0..n)
            .map(|i| CatalogFoodItem {
                id: Uuid::new_v4(),
                name: format!("Dish {i}"),
                food_type: FoodType::Veg,
                eating_types: BTreeSet::from([EatingType::Lunch]),
                cuisines: BTreeSet::new(),
            })
            .collect()
    }

    #[test]
    fn owned_names_never_sampled() {
        let items = page(50);
        let owned: HashSet<String> = (0..5).map(|i| format!("Dish {}", i * 10)).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let sample = select_sample(&items, &owned, 15, &mut rng);
        assert_eq!(sample.len(), 15);
        assert!(sample.iter().all(|item| !owned.contains(&item.name)));

        let distinct: HashSet<_> = sample.iter().map(|i| i.id).collect();
        assert_eq!(distinct.len(), 15);
    }

    #[test]
    fn small_remainder_is_returned_whole() {
        let items = page(6);
        let owned: HashSet<String> = ["Dish 0".to_string(), "Dish 1".to_string()].into();
        let mut rng = StdRng::seed_from_u64(1);
        let sample = select_sample(&items, &owned, 15, &mut rng);
        assert_eq!(sample.len(), 4);
    }

    #[test]
    fn name_match_is_case_sensitive() {
        let items = page(3);
        let owned: HashSet<String> = ["dish 0".to_string()].into();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(select_sample(&items, &owned, 10, &mut rng).len(), 3);
    }

    #[test]
    fn same_seed_same_sample() {
        let items = page(40);
        let owned = HashSet::new();
        let a = select_sample(&items, &owned, 10, &mut StdRng::seed_from_u64(99));
        let b = select_sample(&items, &owned, 10, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_page_gives_empty_sample() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(select_sample(&[], &HashSet::new(), 15, &mut rng).is_empty());
    }
}
