use time::{Date, Duration};

use crate::foods::model::PersonalFoodItem;

/// Last day of the waiting period; the item is due from the day after.
/// `None` for items that were never consumed.
pub fn next_eligible_date(item: &PersonalFoodItem) -> Option<Date> {
    let last = item.last_consumption_date?;
    let days = item.repeat_after_days.unwrap_or(0);
    Some(last.saturating_add(Duration::days(i64::from(days))))
}

/// Whether `item` is due for suggestion on `today`.
///
/// Never-consumed items are always due, whatever their waiting period.
/// Otherwise the comparison is strict: an item whose waiting period ends
/// today is not due until tomorrow.
pub fn is_eligible(item: &PersonalFoodItem, today: Date) -> bool {
    next_eligible_date(item).map_or(true, |next| next < today)
}

/// Due items, oldest-consumed first. Never-consumed items lead.
pub fn due_items<'a, I>(items: I, today: Date) -> Vec<PersonalFoodItem>
where
    I: IntoIterator<Item = &'a PersonalFoodItem>,
{
    let mut due: Vec<PersonalFoodItem> = items
        .into_iter()
        .filter(|item| is_eligible(item, today))
        .cloned()
        .collect();
    due.sort_by_key(|item| item.last_consumption_date);
    due
}
