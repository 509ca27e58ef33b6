use anyhow::Result;
use serde_json::json;

fn main() -> Result<()> {
    let path = std::path::Path::new("sampledata/Events");
    std::fs::create_dir_all(path)?;

    let schema = json!([
        { "ColumnName": "id", "ColumnType": "long" },
        { "ColumnName": "msg", "ColumnType": "string" },
        { "ColumnName": "level", "ColumnType": "string" },
        { "ColumnName": "ts", "ColumnType": "datetime" }
    ]);
    let data = json!([
        { "id": 1, "msg": "hello", "level": "info", "ts": "2024-01-01T00:00:00Z" },
        { "id": 2, "msg": "disk almost full", "level": "warn", "ts": "2024-01-01T00:05:00Z" },
        { "id": 3, "msg": "request failed", "level": "error", "ts": "2024-01-01T00:07:30Z" },
        { "id": 4, "msg": "retry succeeded", "level": "info", "ts": "2024-01-01T00:07:31Z" }
    ]);

    std::fs::write(path.join("schema.json"), serde_json::to_string_pretty(&schema)?)?;
    std::fs::write(path.join("data.json"), serde_json::to_string_pretty(&data)?)?;
    println!("Seeded sample data at {}", path.display());
    Ok(())
}
