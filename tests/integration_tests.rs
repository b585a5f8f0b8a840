use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rent_roll::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn record(id: &str, doc: Value) -> PeriodRecord {
    PeriodRecord::from_document(id.parse().unwrap(), &doc).unwrap()
}

fn sample_year() -> Vec<PeriodRecord> {
    vec![
        record(
            "2025-01",
            json!({
                "Acme": { "Unit A": 500000, "Unit A__obs": "paid late", "Unit B": "250000" },
                "Société Ñuble": { "Lot 1": 1200, "Lot 1__ontime": true }
            }),
        ),
        record(
            "2025-02",
            json!({
                "ACME": { "unit a": 300000, "UNIT B__status": false },
                "societe nuble": { "LOT 1": "1.5", "Lot 1__obs": "cash" }
            }),
        ),
        record(
            "2025-03",
            json!({ "acme": { "Unit A": "n/a", "Unit C": 10 }, "Beta": { "Casa": 70 } }),
        ),
        record("2024-12", json!({ "Acme": { "Unit A": 123 } })),
        record("2026-01", json!({ "Acme": { "Unit A": 456 } })),
    ]
}

#[test]
fn test_annual_scenario() {
    let records = vec![
        record(
            "2025-01",
            json!({ "Acme": { "Unit A": 500000, "Unit A__obs": "paid late" } }),
        ),
        record("2025-02", json!({ "ACME": { "unit a": 300000 } })),
    ];

    let annual = aggregate_year(&records, 2025);

    let mut expected = BTreeMap::new();
    expected.insert(
        "Acme".to_string(),
        BTreeMap::from([("Unit A".to_string(), 800000.0)]),
    );
    assert_eq!(annual.totals, expected);
}

#[test]
fn test_aggregate_is_order_independent() {
    let records = sample_year();
    let baseline = aggregate_year(&records, 2025);

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..25 {
        let mut shuffled = records.clone();
        shuffled.shuffle(&mut rng);
        assert_eq!(aggregate_year(&shuffled, 2025), baseline);
    }

    let mut reversed = records;
    reversed.reverse();
    assert_eq!(aggregate_year(&reversed, 2025), baseline);
}

#[test]
fn test_aggregate_excludes_reserved_suffixes() {
    let annual = aggregate_year(&sample_year(), 2025);
    let config = RentRollConfig::default();

    for (owner, block) in &annual.totals {
        for key in block.keys() {
            assert!(
                config.reserved_suffixes().all(|suffix| !key.ends_with(suffix)),
                "reserved key {} leaked into totals of {}",
                key,
                owner
            );
        }
    }

    assert_eq!(annual.amount("acme", "unit a"), 800000.0);
    assert_eq!(annual.amount("acme", "unit b"), 250000.0);
    assert_eq!(annual.amount("acme", "unit c"), 10.0);
    assert_eq!(annual.amount("SOCIETE NUBLE", "lot 1"), 1201.5);
    assert_eq!(annual.amount("beta", "casa"), 70.0);
    assert!(annual.totals.keys().any(|k| k == "Société Ñuble"));
}

#[test]
fn test_find_nested_value_scenario() {
    let mut map = BTreeMap::new();
    map.insert(
        "Société".to_string(),
        BTreeMap::from([("Lot 1".to_string(), 1200.0)]),
    );
    assert_eq!(find_nested_value(&map, "societe", "lot 1"), 1200.0);
    assert_eq!(find_nested_value(&map, "societe", "lot 9"), 0.0);
}

#[test]
fn test_normalize_properties() {
    let samples = [
        "Société Générale",
        "  CASA  ",
        "Ñuñoa",
        "Árbol Ü",
        "",
        "lote 2-B",
    ];
    for s in samples {
        assert_eq!(normalize(&normalize(s)), normalize(s));
    }

    assert_eq!(normalize("ÉLAN"), normalize("elan"));
    assert_eq!(normalize("Ñuble"), normalize("nuble"));

    let map: BTreeMap<String, f64> = BTreeMap::from([("Casa".to_string(), 1.0)]);
    assert_eq!(find_key(&map, "Departamento"), None);
}

#[test]
fn test_month_scenarios() {
    let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
    assert_eq!(month_id(date), "2025-01");
    assert_eq!(month_label("2025-01"), "Enero 2025");
    assert_eq!(previous_month_id(&month_id(date)), "2024-12");
}

#[test]
fn test_last_n_month_ids_contiguous() {
    let ids = last_n_month_ids("2025-06", 12);
    assert_eq!(ids.len(), 12);
    assert_eq!(ids[0], "2025-06");
    assert_eq!(ids[11], "2024-07");

    for pair in ids.windows(2) {
        assert!(pair[0] > pair[1]);
        assert_eq!(previous_month_id(&pair[0]), pair[1]);
    }
}

#[test]
fn test_csv_export_reads_back() -> anyhow::Result<()> {
    let annual = aggregate_year(&sample_year(), 2025);
    let exported = annual.to_csv();

    let mut reader = csv::Reader::from_reader(exported.as_bytes());
    assert_eq!(
        reader.headers()?.iter().collect::<Vec<_>>(),
        vec!["Year", "Owner", "Property", "Total"]
    );

    let mut rows = 0;
    for row in reader.deserialize() {
        let (year, owner, property, total): (i32, String, String, f64) = row?;
        assert_eq!(year, 2025);
        assert!((annual.amount(&owner, &property) - total).abs() < 0.005);
        rows += 1;
    }
    assert_eq!(rows, annual.totals.values().map(BTreeMap::len).sum::<usize>());

    let json: Value = serde_json::from_str(&annual.to_json()?)?;
    assert_eq!(json["year"], json!(2025));
    Ok(())
}

#[test]
fn test_period_edits_keep_historic_keys() {
    let schema = KeySchema::default();
    let mut current = record(
        "2025-02",
        json!({ "ACME": { "unit a": 300000, "unit a__status": false } }),
    );

    current.set_amount("Acme", "Unit A", 310000.0);
    current.set_on_time("Acme", "Unit A", Some(true), &schema);
    current.set_observation("Acme", "Unit A", "transfer", &schema);

    let doc = current.to_document();
    assert_eq!(doc["ACME"]["unit a"], json!(310000.0));
    assert_eq!(doc["ACME"]["unit a__ontime"], json!(true));
    assert!(doc["ACME"].get("unit a__status").is_none());
    assert_eq!(doc["ACME"]["unit a__obs"], json!("transfer"));
    assert!(doc.get("Acme").is_none());
}

#[test]
fn test_structure_contracts_and_state() -> anyhow::Result<()> {
    let mut state = RentRollState::with_anchor(RentRollConfig::default(), "2025-03".parse()?);

    state.on_structure(&json!({
        "owners": [
            { "name": "Acme", "properties": ["Unit A", "Unit B"] },
            { "name": "Société Ñuble", "properties": ["Lot 1"] }
        ]
    }));
    for r in sample_year() {
        state.on_period(r.month, &r.to_document())?;
    }

    let contracts = vec![
        (
            canonical_contract_id("Acme", "Unit A"),
            json!({ "arrendatario": "Ana", "contratoPdfUrl": "https://x/a.pdf", "reajuste": [3] }),
        ),
        (
            canonical_contract_id("Société Ñuble", "Lot 1"),
            json!({ "cliente": "Luis", "valorArriendoUF": 12.5 }),
        ),
    ];
    state.on_contracts(contracts.iter().map(|(id, doc)| (id.as_str(), doc)));

    // 2025-03 has only "Unit C" (not configured) and an unparseable Unit A
    assert_eq!(state.total_kpi(), 0.0);

    state.select_month("2025-02".parse()?);
    assert_eq!(state.total_kpi(), 300001.5);

    state.set_view(ViewMode::Year);
    assert_eq!(state.total_kpi(), 800000.0 + 250000.0 + 1201.5);

    let rows = state.owner_rows("acme");
    assert_eq!(rows[0].previous, 500000.0);
    assert_eq!(rows[1].on_time, Some(false));

    let missing = state.missing_contracts();
    assert_eq!(missing.len(), 2);
    assert_eq!(missing[0].missing[0].property, "Unit B");
    assert_eq!(missing[0].missing[0].status, MissingStatus::NoRecord);
    assert_eq!(missing[1].missing[0].status, MissingStatus::NoDocument);

    state.select_month("2025-03".parse()?);
    assert_eq!(state.adjustments_due().len(), 1);

    let lot = state.contracts().resolve("societe nuble", "LOT 1").unwrap();
    assert_eq!(lot.rent, Some(Money::new(12.5, Currency::Uf)));

    // renaming an owner does not move its contracts
    state.apply_edit(&StructureEdit::RenameOwner {
        target: "acme".to_string(),
        new_name: "Acme Rentals".to_string(),
    })?;
    assert!(state.contracts().resolve("Acme Rentals", "Unit A").is_none());
    Ok(())
}

#[test]
fn test_uf_conversion_flow() -> anyhow::Result<()> {
    let quote = UfQuote::from_mindicador(&json!({
        "serie": [{ "fecha": "2025-03-01T03:00:00.000Z", "valor": 38500.0 }]
    }))?;

    let rent_uf = clp_to_uf(parse_number_es("770.000"), Some(&quote)).unwrap();
    assert!((rent_uf - 20.0).abs() < 1e-9);
    assert_eq!(format_uf(rent_uf), "20,00");
    assert_eq!(format_clp(uf_to_clp(20.0, Some(&quote)).unwrap()), "$770.000");
    Ok(())
}
