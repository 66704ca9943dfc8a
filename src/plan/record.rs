use std::collections::BTreeMap;

use chrono::NaiveDate;
use indexmap::IndexMap;

/// SKU code to record, in first-seen order.
pub type SkuMap = IndexMap<String, SkuRecord>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptiveFields {
    pub name: String,
    pub spu: String,
    pub spec: String,
    pub color: String,
    pub size: String,
}

impl DescriptiveFields {
    /// Copy every field that is still empty here from `other`.
    pub fn fill_missing(&mut self, other: &DescriptiveFields) {
        fill(&mut self.name, &other.name);
        fill(&mut self.spu, &other.spu);
        fill(&mut self.spec, &other.spec);
        fill(&mut self.color, &other.color);
        fill(&mut self.size, &other.size);
    }
}

fn fill(slot: &mut String, value: &str) {
    if slot.is_empty() && !value.is_empty() {
        *slot = value.to_string();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkuRecord {
    pub sku_code: String,
    pub fields: DescriptiveFields,
    pub dates: BTreeMap<NaiveDate, f64>,
}

impl SkuRecord {
    pub fn new(sku_code: impl Into<String>) -> Self {
        Self {
            sku_code: sku_code.into(),
            fields: DescriptiveFields::default(),
            dates: BTreeMap::new(),
        }
    }

    /// Accumulate a delivery. Quantities on the same date are summed.
    pub fn add_quantity(&mut self, date: NaiveDate, quantity: f64) {
        if quantity == 0.0 {
            return;
        }
        *self.dates.entry(date).or_insert(0.0) += quantity;
    }

    pub fn total(&self) -> f64 {
        self.dates.values().sum()
    }

    /// Sum of quantities dated in `[start, start + days)`.
    pub fn window_total(&self, start: NaiveDate, days: u32) -> f64 {
        let Some(end) = start.checked_add_days(chrono::Days::new(u64::from(days))) else {
            return self.dates.range(start..).map(|(_, qty)| qty).sum();
        };
        self.dates.range(start..end).map(|(_, qty)| qty).sum()
    }

    pub fn first_delivery(&self) -> Option<(NaiveDate, f64)> {
        self.dates.iter().next().map(|(date, qty)| (*date, *qty))
    }
}

/// Entry for `sku`, created with `fields` on first sight; later sightings only
/// fill fields that are still empty.
pub fn upsert<'a>(map: &'a mut SkuMap, sku: &str, fields: &DescriptiveFields) -> &'a mut SkuRecord {
    let record = map
        .entry(sku.to_string())
        .or_insert_with(|| SkuRecord::new(sku));
    record.fields.fill_missing(fields);
    record
}

/// Union two per-sheet maps. `primary` keeps its order and descriptive
/// values; SKUs only in `secondary` are appended in their own order.
pub fn merge_sku_maps(primary: SkuMap, secondary: SkuMap) -> SkuMap {
    let mut merged = primary;
    for (sku, record) in secondary {
        let target = upsert(&mut merged, &sku, &record.fields);
        for (date, quantity) in record.dates {
            target.add_quantity(date, quantity);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn same_date_quantities_are_summed() {
        let mut record = SkuRecord::new("A");
        record.add_quantity(day(17), 100.0);
        record.add_quantity(day(17), 100.0);
        record.add_quantity(day(18), 0.0);
        assert_eq!(record.dates.len(), 1);
        assert_eq!(record.dates[&day(17)], 200.0);
    }

    #[test]
    fn merge_keeps_primary_fields_and_sums_dates() {
        let mut primary = SkuMap::new();
        let record = upsert(
            &mut primary,
            "002",
            &DescriptiveFields {
                color: "红色".into(),
                ..Default::default()
            },
        );
        record.add_quantity(day(17), 10.0);

        let mut secondary = SkuMap::new();
        let record = upsert(
            &mut secondary,
            "002",
            &DescriptiveFields {
                color: "蓝色".into(),
                size: "M".into(),
                ..Default::default()
            },
        );
        record.add_quantity(day(17), 5.0);
        record.add_quantity(day(20), 7.0);

        let merged = merge_sku_maps(primary, secondary);
        let record = &merged["002"];
        assert_eq!(record.fields.color, "红色");
        assert_eq!(record.fields.size, "M");
        assert_eq!(record.dates[&day(17)], 15.0);
        assert_eq!(record.dates[&day(20)], 7.0);
    }

    #[test]
    fn window_total_is_half_open() {
        let mut record = SkuRecord::new("A");
        record.add_quantity(day(1), 1.0);
        record.add_quantity(day(3), 2.0);
        record.add_quantity(day(4), 4.0);
        assert_eq!(record.window_total(day(1), 3), 3.0);
    }

    #[test]
    fn first_delivery_is_the_earliest_date() {
        let mut record = SkuRecord::new("A");
        assert_eq!(record.first_delivery(), None);
        record.add_quantity(day(20), 3.0);
        record.add_quantity(day(18), 5.0);
        let copy = record.clone();
        assert_eq!(copy.first_delivery(), Some((day(18), 5.0)));
        assert_eq!(copy.total(), 8.0);
        assert_eq!(copy, record);
    }
}
