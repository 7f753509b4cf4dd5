use anyhow::Context;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use mot_defect_insights::models::{DefectRecord, VehicleYearRate};
use mot_defect_insights::InspectionCorpus;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let vehicles = [
        ("FORD", "FOCUS", 2015, 881_000, 612_400),
        ("FORD", "FOCUS", 2009, 402_300, 254_100),
        ("FORD", "FIESTA", 2015, 1_204_500, 883_900),
        ("FORD", "FIESTA", 2009, 655_200, 421_700),
        ("VAUXHALL", "ASTRA", 2015, 590_800, 402_600),
        ("VAUXHALL", "ASTRA", 2009, 371_900, 228_300),
        ("VAUXHALL", "CORSA", 2015, 812_700, 577_000),
        ("VOLKSWAGEN", "GOLF", 2015, 640_100, 471_300),
        ("VOLKSWAGEN", "GOLF", 2003, 98_600, 55_900),
        ("TOYOTA", "YARIS", 2015, 305_400, 249_900),
    ];

    for (make, model, model_year, total_tests, total_passes) in vehicles {
        upsert_vehicle_tests(
            pool,
            &VehicleYearRate {
                make: make.to_string(),
                model: model.to_string(),
                model_year,
                total_tests,
                total_passes,
            },
        )
        .await?;
    }

    let defects = [
        ("FORD", "FOCUS", 2015, "Brakes imbalance (axle, 70%)", "Brakes", 18_412),
        ("FORD", "FOCUS", 2015, "Brakes imbalance (steered axle, 50%)", "Brakes", 2_934),
        ("FORD", "FOCUS", 2015, "Nearside front coil spring fractured", "Suspension", 6_120),
        ("FORD", "FOCUS", 2015, "Tyre tread depth below requirements of 1.6mm", "Tyres", 21_800),
        ("FORD", "FOCUS", 2009, "Brake pipe excessively corroded", "Brakes", 5_310),
        ("FORD", "FOCUS", 2009, "Horn inoperative", "Horn", 940),
        ("FORD", "FIESTA", 2015, "Brakes imbalance (axle, 70%)", "Brakes", 6_030),
        ("FORD", "FIESTA", 2015, "Brakes imbalance (steered axle, 50%)", "Brakes", 1_020),
        ("FORD", "FIESTA", 2015, "Tyre tread depth below requirements of 1.6mm", "Tyres", 27_300),
        ("FORD", "FIESTA", 2009, "Brake pipe excessively corroded", "Brakes", 7_990),
        ("VAUXHALL", "ASTRA", 2015, "Brakes imbalance (axle, 70%)", "Brakes", 3_400),
        ("VAUXHALL", "ASTRA", 2015, "Nearside front coil spring fractured", "Suspension", 2_050),
        ("VAUXHALL", "ASTRA", 2009, "Horn inoperative", "Horn", 610),
        ("VAUXHALL", "CORSA", 2015, "Tyre tread depth below requirements of 1.6mm", "Tyres", 19_400),
        ("VAUXHALL", "CORSA", 2015, "Headlamp aim too high", "Lamps, reflectors and electrical equipment", 8_800),
        ("VOLKSWAGEN", "GOLF", 2015, "Brakes imbalance (axle, 70%)", "Brakes", 2_700),
        ("VOLKSWAGEN", "GOLF", 2003, "Brake pipe excessively corroded", "Brakes", 2_240),
        ("TOYOTA", "YARIS", 2015, "Headlamp aim too high", "Lamps, reflectors and electrical equipment", 2_950),
    ];

    for (make, model, model_year, description, category, occurrence_count) in defects {
        upsert_defect(
            pool,
            &DefectRecord {
                make: make.to_string(),
                model: model.to_string(),
                model_year,
                defect_description: description.to_string(),
                category: category.to_string(),
                occurrence_count,
            },
        )
        .await?;
    }

    Ok(())
}

fn to_db_count(value: u64) -> anyhow::Result<i64> {
    i64::try_from(value).context("count does not fit in BIGINT")
}

fn from_db_count(value: i64, column: &str) -> anyhow::Result<u64> {
    u64::try_from(value).with_context(|| format!("negative value in {column}"))
}

async fn upsert_vehicle_tests(pool: &PgPool, row: &VehicleYearRate) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO mot_insights.vehicle_tests
        (id, make, model, model_year, total_tests, total_passes)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (make, model, model_year) DO UPDATE
        SET total_tests = EXCLUDED.total_tests, total_passes = EXCLUDED.total_passes
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(row.make.trim().to_uppercase())
    .bind(row.model.trim().to_uppercase())
    .bind(row.model_year)
    .bind(to_db_count(row.total_tests)?)
    .bind(to_db_count(row.total_passes)?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

async fn upsert_defect(pool: &PgPool, row: &DefectRecord) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO mot_insights.defect_counts
        (id, make, model, model_year, defect_description, category, occurrence_count)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (make, model, model_year, defect_description) DO UPDATE
        SET category = EXCLUDED.category, occurrence_count = EXCLUDED.occurrence_count
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(row.make.trim().to_uppercase())
    .bind(row.model.trim().to_uppercase())
    .bind(row.model_year)
    .bind(&row.defect_description)
    .bind(&row.category)
    .bind(to_db_count(row.occurrence_count)?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn import_vehicle_tests(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for result in reader.deserialize::<VehicleYearRate>() {
        let row = result?;
        if row.total_passes > row.total_tests {
            tracing::warn!(
                make = %row.make,
                model = %row.model,
                model_year = row.model_year,
                "skipping row with more passes than tests"
            );
            continue;
        }
        if upsert_vehicle_tests(pool, &row).await? > 0 {
            imported += 1;
        }
    }

    Ok(imported)
}

pub async fn import_defects(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for result in reader.deserialize::<DefectRecord>() {
        let row = result?;
        if upsert_defect(pool, &row).await? > 0 {
            imported += 1;
        }
    }

    Ok(imported)
}

/// Load every row into memory; analysis never queries storage directly.
pub async fn fetch_corpus(pool: &PgPool) -> anyhow::Result<InspectionCorpus> {
    let vehicle_rows = sqlx::query(
        "SELECT make, model, model_year, total_tests, total_passes \
         FROM mot_insights.vehicle_tests \
         ORDER BY make, model, model_year",
    )
    .fetch_all(pool)
    .await
    .context("failed to load vehicle test totals")?;

    let mut vehicles = Vec::with_capacity(vehicle_rows.len());
    for row in vehicle_rows {
        vehicles.push(VehicleYearRate {
            make: row.get("make"),
            model: row.get("model"),
            model_year: row.get("model_year"),
            total_tests: from_db_count(row.get("total_tests"), "total_tests")?,
            total_passes: from_db_count(row.get("total_passes"), "total_passes")?,
        });
    }

    let defect_rows = sqlx::query(
        "SELECT make, model, model_year, defect_description, category, occurrence_count \
         FROM mot_insights.defect_counts \
         ORDER BY make, model, model_year, occurrence_count DESC, defect_description",
    )
    .fetch_all(pool)
    .await
    .context("failed to load defect counts")?;

    let mut defects = Vec::with_capacity(defect_rows.len());
    for row in defect_rows {
        defects.push(DefectRecord {
            make: row.get("make"),
            model: row.get("model"),
            model_year: row.get("model_year"),
            defect_description: row.get("defect_description"),
            category: row.get("category"),
            occurrence_count: from_db_count(row.get("occurrence_count"), "occurrence_count")?,
        });
    }

    tracing::info!(
        vehicles = vehicles.len(),
        defects = defects.len(),
        "corpus loaded"
    );

    Ok(InspectionCorpus::new(defects, vehicles))
}
