use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::PageView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

/// A field value to sort on.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Integer(u128),
    Float(f64),
    /// Compared case-insensitively.
    Text(String),
}

impl SortValue {
    pub fn text(value: &str) -> Self {
        SortValue::Text(value.to_lowercase())
    }

    /// Total order. Numbers compare numerically across both variants and sort
    /// before text.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Integer(a), SortValue::Integer(b)) => a.cmp(b),
            (SortValue::Float(a), SortValue::Float(b)) => a.total_cmp(b),
            (SortValue::Integer(a), SortValue::Float(b)) => (*a as f64).total_cmp(b),
            (SortValue::Float(a), SortValue::Integer(b)) => a.total_cmp(&(*b as f64)),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Text(_), _) => Ordering::Greater,
            (_, SortValue::Text(_)) => Ordering::Less,
        }
    }
}

/// Stable sort, so ties keep their input order and re-sorting changes nothing.
pub fn sort_by_value<T>(items: &mut [T], key: impl Fn(&T) -> SortValue, order: Order) {
    items.sort_by(|a, b| {
        let ordering = key(a).compare(&key(b));
        match order {
            Order::Asc => ordering,
            Order::Desc => ordering.reverse(),
        }
    });
}

/// Slices one page out of an already sorted list. Pages are zero-based.
pub fn paginate<T: Clone>(sorted: &[T], page: usize, page_size: usize) -> PageView<T> {
    let page_size = page_size.max(1);
    let total_count = sorted.len();
    let start = page.saturating_mul(page_size).min(total_count);
    let end = start.saturating_add(page_size).min(total_count);
    PageView {
        items: sorted[start..end].to_vec(),
        page,
        page_size,
        total_count,
        total_pages: total_count.div_ceil(page_size),
    }
}

/// Sorts first, then paginates.
pub fn sort_and_paginate<T: Clone>(
    mut items: Vec<T>,
    key: impl Fn(&T) -> SortValue,
    order: Order,
    page: usize,
    page_size: usize,
) -> PageView<T> {
    sort_by_value(&mut items, key, order);
    paginate(&items, page, page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: &'static str,
        capacity: u128,
    }

    fn row(name: &'static str, capacity: u128) -> Row {
        Row { name, capacity }
    }

    fn rows() -> Vec<Row> {
        vec![
            row("bravo", 30),
            row("Alpha", 10),
            row("charlie", 30),
            row("alpha", 20),
        ]
    }

    #[test]
    fn text_sorts_case_insensitively() {
        let mut items = rows();
        sort_by_value(&mut items, |r| SortValue::text(r.name), Order::Asc);
        let names: Vec<_> = items.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Alpha", "alpha", "bravo", "charlie"]);
    }

    #[test]
    fn numeric_descending_keeps_ties_in_input_order() {
        let mut items = rows();
        sort_by_value(&mut items, |r| SortValue::Integer(r.capacity), Order::Desc);
        let names: Vec<_> = items.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["bravo", "charlie", "alpha", "Alpha"]);
    }

    #[test]
    fn sorting_twice_is_a_no_op() {
        for order in [Order::Asc, Order::Desc] {
            let mut once = rows();
            sort_by_value(&mut once, |r| SortValue::Integer(r.capacity), order);
            let mut twice = once.clone();
            sort_by_value(&mut twice, |r| SortValue::Integer(r.capacity), order);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn numbers_sort_before_text() {
        let mut values = vec![
            SortValue::text("Zed"),
            SortValue::Float(2.5),
            SortValue::Integer(1),
        ];
        sort_by_value(&mut values, |v| v.clone(), Order::Asc);
        assert_eq!(
            values,
            vec![
                SortValue::Integer(1),
                SortValue::Float(2.5),
                SortValue::Text("zed".into())
            ]
        );
    }

    #[test]
    fn paginates_after_sorting() {
        let by_capacity = |r: &Row| SortValue::Integer(r.capacity);
        let page = sort_and_paginate(rows(), by_capacity, Order::Asc, 1, 3);
        assert_eq!(page.total_count, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "charlie");

        let beyond = paginate(&rows(), 9, 3);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_pages, 2);
    }
}
