//! Province and cause aggregation plus the two HTML heat maps.

use crate::config::MapSettings;
use crate::ledger::Ledger;
use crate::utils::{collapse_whitespace, escape_html, slugify};
use crate::validators::multiclass::match_vocabulary;
use crate::validators::numeric::first_number;
use crate::validators::provinces::{UNKNOWN, normalize_province};
use chrono::Local;
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;

/// Map centre used when no province has coordinates.
const THAILAND_CENTER: (f64, f64) = (13.0, 101.0);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProvinceStats {
    pub province: String,
    pub region: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub incidents: usize,
    pub deaths: u64,
    pub injured: u64,
    pub causes: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CauseStats {
    pub cause: String,
    pub incidents: usize,
    pub deaths: u64,
}

/// Everything the map pages and `heat_summary.json` are built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeatSummary {
    pub title: String,
    pub generated_at: String,
    pub total_incidents: usize,
    pub total_deaths: u64,
    pub total_injured: u64,
    /// Sorted by deaths, then incidents, descending.
    pub provinces: Vec<ProvinceStats>,
    /// Sorted by incidents, then deaths, descending.
    pub causes: Vec<CauseStats>,
    /// `matrix[p][c]`: incidents in `provinces[p]` with cause `causes[c]`.
    pub matrix: Vec<Vec<usize>>,
}

fn count_of(cell: Option<&str>) -> u64 {
    cell.and_then(first_number)
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n.round() as u64)
        .unwrap_or(0)
}

/// Common heat causes and the spellings that mean them.
const HEAT_CAUSES: &[(&str, &[&str])] = &[
    ("โรคลมแดด", &["ลมแดด", "ลมร้อน", "heat stroke", "heatstroke", "ฮีทสโตรก", "ฮีตสโตรก", "ฮีทสโตรค"]),
    ("เพลียแดด", &["เพลียแดด", "อ่อนเพลียจากความร้อน", "heat exhaustion"]),
    ("ตะคริวจากความร้อน", &["ตะคริวแดด", "ตะคริวจากความร้อน", "heat cramp"]),
    ("ขาดน้ำ", &["ขาดน้ำ", "dehydration"]),
];

/// One grouping key per cause: known heat causes, then the column's
/// vocabulary, then the trimmed lower-cased text.
fn canonical_cause(raw: &str, vocabulary: &[String]) -> Option<String> {
    let cleaned = collapse_whitespace(raw.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':' | '"' | '\'' | '-')
    }));
    if cleaned.is_empty() {
        return None;
    }
    let lower = cleaned.to_lowercase();
    if let Some((cause, _)) = HEAT_CAUSES
        .iter()
        .find(|(cause, aliases)| lower.contains(cause) || aliases.iter().any(|a| lower.contains(a)))
    {
        return Some(cause.to_string());
    }
    Some(match_vocabulary(&cleaned, vocabulary).unwrap_or(lower))
}

/// Causes named in one cell: a JSON string array or a single value.
fn causes_of(cell: Option<&str>, vocabulary: &[String]) -> Vec<String> {
    let Some(cell) = cell.map(str::trim).filter(|c| !c.is_empty()) else {
        return vec![UNKNOWN.to_string()];
    };
    let items = serde_json::from_str::<Vec<String>>(cell).unwrap_or_else(|_| vec![cell.to_string()]);
    let listed: Vec<String> = items
        .iter()
        .filter_map(|i| canonical_cause(i, vocabulary))
        .unique()
        .collect();
    if listed.is_empty() {
        vec![UNKNOWN.to_string()]
    } else {
        listed
    }
}

/// Aggregate heat records by province and cause.
///
/// Provinces that do not resolve to one of the 77 provinces count under
/// `ไม่ระบุ`; non-numeric death and injured cells count as zero. Causes are
/// grouped through [`canonical_cause`] with `cause_vocabulary`.
pub fn aggregate(ledger: &Ledger, fields: &MapSettings, cause_vocabulary: &[String]) -> HeatSummary {
    let mut provinces: BTreeMap<String, ProvinceStats> = BTreeMap::new();
    let mut causes: BTreeMap<String, CauseStats> = BTreeMap::new();

    for row in 0..ledger.len() {
        let deaths = count_of(ledger.value(row, &fields.deaths_column));
        let injured = count_of(ledger.value(row, &fields.injured_column));
        let resolved = ledger
            .value(row, &fields.province_column)
            .and_then(normalize_province);
        let name = resolved.map_or(UNKNOWN, |p| p.thai);

        let entry = provinces.entry(name.to_string()).or_insert_with(|| ProvinceStats {
            province: name.to_string(),
            region: resolved.map_or(UNKNOWN, |p| p.region).to_string(),
            lat: resolved.map(|p| p.lat),
            lon: resolved.map(|p| p.lon),
            ..Default::default()
        });
        entry.incidents += 1;
        entry.deaths += deaths;
        entry.injured += injured;

        for cause in causes_of(ledger.value(row, &fields.cause_column), cause_vocabulary) {
            *entry.causes.entry(cause.clone()).or_default() += 1;
            let total = causes.entry(cause.clone()).or_insert_with(|| CauseStats {
                cause,
                ..Default::default()
            });
            total.incidents += 1;
            total.deaths += deaths;
        }
    }

    let provinces: Vec<ProvinceStats> = provinces
        .into_values()
        .sorted_by(|a, b| {
            b.deaths
                .cmp(&a.deaths)
                .then(b.incidents.cmp(&a.incidents))
                .then(a.province.cmp(&b.province))
        })
        .collect();
    let causes: Vec<CauseStats> = causes
        .into_values()
        .sorted_by(|a, b| {
            b.incidents
                .cmp(&a.incidents)
                .then(b.deaths.cmp(&a.deaths))
                .then(a.cause.cmp(&b.cause))
        })
        .collect();
    let matrix = provinces
        .iter()
        .map(|p| {
            causes
                .iter()
                .map(|c| p.causes.get(&c.cause).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    HeatSummary {
        title: fields.title.clone(),
        generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        total_incidents: ledger.len(),
        total_deaths: provinces.iter().map(|p| p.deaths).sum(),
        total_injured: provinces.iter().map(|p| p.injured).sum(),
        provinces,
        causes,
        matrix,
    }
}

/// Circle marker radius in pixels.
pub fn marker_radius(deaths: u64, incidents: usize) -> f64 {
    let weight = if deaths > 0 { deaths as f64 } else { incidents as f64 * 0.5 };
    (6.0 + weight.sqrt() * 4.0).min(40.0)
}

/// Background colour for a heat cell, white through dark red.
pub fn heat_color(value: usize, max: usize) -> String {
    if value == 0 || max == 0 {
        return "#ffffff".to_string();
    }
    let t = (value as f64 / max as f64).clamp(0.0, 1.0);
    let lerp = |from: u8, to: u8| (from as f64 + (to as f64 - from as f64) * t).round() as u8;
    format!("#{:02x}{:02x}{:02x}", lerp(0xfe, 0xa5), lerp(0xe0, 0x0f), lerp(0xd2, 0x15))
}

/// JSON safe to embed inside a `<script>` element.
fn script_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

fn build_page(title: &str, head: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="th">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
{head}
<style>
*{{margin:0;padding:0;box-sizing:border-box;}}
body{{font-family:"Sarabun",-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;color:#1a1a1a;background:#fafafa;}}
.header{{background:#7f0000;color:#fff;padding:12px 24px;}}
.header h1{{font-size:18px;font-weight:600;}}
.header p{{font-size:13px;color:#ffd7cc;margin-top:4px;}}
.container{{max-width:1200px;margin:0 auto;padding:24px;}}
#map{{height:600px;border-radius:8px;margin-bottom:24px;border:1px solid #ddd;}}
table{{border-collapse:collapse;width:100%;font-size:14px;background:#fff;}}
th,td{{border:1px solid #e0e0e0;padding:6px 10px;}}
th{{background:#f5f5f5;cursor:pointer;user-select:none;}}
td.num{{text-align:right;}}
.matrix td{{text-align:center;min-width:48px;}}
.matrix th.row{{text-align:left;cursor:default;}}
</style>
</head>
<body>
{content}
</body>
</html>"#,
        title = escape_html(title),
    )
}

fn header(summary: &HeatSummary, subtitle: &str) -> String {
    format!(
        r#"<div class="header"><h1>{title}</h1><p>{subtitle} · {incidents} incidents · {deaths} deaths · {injured} injured · generated {generated}</p></div>"#,
        title = escape_html(&summary.title),
        subtitle = escape_html(subtitle),
        incidents = summary.total_incidents,
        deaths = summary.total_deaths,
        injured = summary.total_injured,
        generated = escape_html(&summary.generated_at),
    )
}

#[derive(Serialize)]
struct Marker<'a> {
    province: &'a str,
    region: &'a str,
    lat: f64,
    lon: f64,
    incidents: usize,
    deaths: u64,
    injured: u64,
    radius: f64,
    causes: &'a BTreeMap<String, usize>,
}

/// Leaflet map of provinces with a sortable ranking table.
pub fn render_province_map(summary: &HeatSummary) -> String {
    let markers: Vec<Marker<'_>> = summary
        .provinces
        .iter()
        .filter_map(|p| {
            Some(Marker {
                province: &p.province,
                region: &p.region,
                lat: p.lat?,
                lon: p.lon?,
                incidents: p.incidents,
                deaths: p.deaths,
                injured: p.injured,
                radius: marker_radius(p.deaths, p.incidents),
                causes: &p.causes,
            })
        })
        .collect();

    let mut rows = String::new();
    for (rank, p) in summary.provinces.iter().enumerate() {
        rows.push_str(&format!(
            r#"<tr id="p-{slug}"><td class="num">{rank}</td><td>{province}</td><td>{region}</td><td class="num">{incidents}</td><td class="num">{deaths}</td><td class="num">{injured}</td></tr>"#,
            slug = slugify(&p.province),
            rank = rank + 1,
            province = escape_html(&p.province),
            region = escape_html(&p.region),
            incidents = p.incidents,
            deaths = p.deaths,
            injured = p.injured,
        ));
        rows.push('\n');
    }

    let content = format!(
        r#"{header}
<div class="container">
<div id="map"></div>
<table id="ranking">
<thead><tr><th>#</th><th>จังหวัด</th><th>ภาค</th><th>เหตุการณ์</th><th>เสียชีวิต</th><th>บาดเจ็บ</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
</div>
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<script>
const markers = {markers};
const map = L.map('map').setView([{lat}, {lon}], 6);
L.tileLayer('https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
    attribution: '&copy; OpenStreetMap contributors',
    maxZoom: 18,
}}).addTo(map);
const esc = s => String(s).replace(/[&<>"']/g, c => ({{'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}})[c]);
markers.forEach(p => {{
    const causes = Object.entries(p.causes).map(([c, n]) => `${{esc(c)}}: ${{n}}`).join('<br>');
    L.circleMarker([p.lat, p.lon], {{
        radius: p.radius, fillColor: p.deaths > 0 ? '#c62828' : '#ef6c00', color: '#fff', weight: 1, fillOpacity: 0.75
    }}).bindPopup(`<strong>${{esc(p.province)}}</strong> <span style="color:#888">${{esc(p.region)}}</span><br>เหตุการณ์ ${{p.incidents}} · เสียชีวิต ${{p.deaths}} · บาดเจ็บ ${{p.injured}}<br><span style="font-size:12px">${{causes}}</span>`).addTo(map);
}});
document.querySelectorAll('#ranking th').forEach((th, col) => th.addEventListener('click', () => {{
    const body = document.querySelector('#ranking tbody');
    const numeric = col !== 1 && col !== 2;
    const asc = th.dataset.asc !== 'true';
    th.dataset.asc = asc;
    const key = r => numeric ? Number(r.cells[col].textContent) : r.cells[col].textContent;
    [...body.rows].sort((a, b) => (key(a) > key(b) ? 1 : key(a) < key(b) ? -1 : 0) * (asc ? 1 : -1)).forEach(r => body.appendChild(r));
}}));
</script>"#,
        header = header(summary, "แผนที่รายจังหวัด"),
        markers = script_json(&markers),
        lat = THAILAND_CENTER.0,
        lon = THAILAND_CENTER.1,
    );

    let head = r#"<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />"#;
    build_page(&summary.title, head, &content)
}

/// Province by cause heat table.
pub fn render_cause_matrix(summary: &HeatSummary) -> String {
    let max = summary.matrix.iter().flatten().copied().max().unwrap_or(0);

    let mut head_cells = String::from(r#"<th class="row">จังหวัด</th>"#);
    for cause in &summary.causes {
        head_cells.push_str(&format!("<th>{}</th>", escape_html(&cause.cause)));
    }
    head_cells.push_str("<th>รวม</th>");

    let mut rows = String::new();
    for (p, counts) in summary.provinces.iter().zip(&summary.matrix) {
        rows.push_str(&format!(r#"<tr><th class="row">{}</th>"#, escape_html(&p.province)));
        for &count in counts {
            let label = if count > 0 { count.to_string() } else { String::new() };
            rows.push_str(&format!(
                r#"<td style="background:{}">{}</td>"#,
                heat_color(count, max),
                label
            ));
        }
        rows.push_str(&format!("<td class=\"num\">{}</td></tr>\n", p.incidents));
    }

    let mut totals = String::from(r#"<tr><th class="row">รวม</th>"#);
    for cause in &summary.causes {
        totals.push_str(&format!("<td>{}</td>", cause.incidents));
    }
    totals.push_str(&format!("<td class=\"num\">{}</td></tr>", summary.total_incidents));

    let content = format!(
        r#"{header}
<div class="container">
<table class="matrix">
<thead><tr>{head_cells}</tr></thead>
<tbody>
{rows}{totals}
</tbody>
</table>
</div>"#,
        header = header(summary, "จังหวัด × สาเหตุ"),
    );
    build_page(&summary.title, "", &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Record;
    use crate::validators::provinces::NORTHEAST;

    fn ledger(rows: &[[&str; 5]]) -> Ledger {
        let mut ledger = Ledger::with_columns(&[
            "url",
            "location_province",
            "death_cause",
            "death_count",
            "injured_count",
        ]);
        for (i, [province, cause, deaths, injured, _]) in rows.iter().enumerate() {
            let record: Record = [
                ("url", format!("https://a.example/{i}")),
                ("location_province", province.to_string()),
                ("death_cause", cause.to_string()),
                ("death_count", deaths.to_string()),
                ("injured_count", injured.to_string()),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
            ledger.push_record(&record);
        }
        ledger
    }

    #[test]
    fn test_aggregate() {
        let rows = [
            ["ขอนแก่น", "โรคลมแดด", "2", "1", ""],
            ["จ.ขอนแก่น", r#"["โรคลมแดด","ขาดน้ำ"]"#, "1", "", ""],
            ["กทม.", "โรคลมแดด", "ไม่ทราบ", "3", ""],
            ["Atlantis", "", "1", "", ""],
        ];
        let summary = aggregate(&ledger(&rows), &MapSettings::default(), &[]);

        assert_eq!(summary.total_incidents, 4);
        assert_eq!(summary.total_deaths, 4);
        assert_eq!(summary.total_injured, 4);

        let first = &summary.provinces[0];
        assert_eq!(first.province, "ขอนแก่น");
        assert_eq!(first.region, NORTHEAST);
        assert_eq!(first.incidents, 2);
        assert_eq!(first.deaths, 3);
        assert!(first.lat.is_some());
        assert_eq!(first.causes["โรคลมแดด"], 2);
        assert_eq!(first.causes["ขาดน้ำ"], 1);

        let unknown = summary.provinces.iter().find(|p| p.province == UNKNOWN).unwrap();
        assert_eq!(unknown.incidents, 1);
        assert_eq!(unknown.lat, None);
        assert_eq!(unknown.causes[UNKNOWN], 1);

        let bangkok = summary.provinces.iter().find(|p| p.province == "กรุงเทพมหานคร").unwrap();
        assert_eq!(bangkok.deaths, 0);
        assert_eq!(bangkok.injured, 3);

        assert_eq!(summary.causes[0].cause, "โรคลมแดด");
        assert_eq!(summary.causes[0].incidents, 3);
        assert_eq!(summary.matrix.len(), summary.provinces.len());
        assert_eq!(summary.matrix[0][0], 2);
    }

    #[test]
    fn test_cause_synonyms_share_a_column() {
        let rows = [
            ["ขอนแก่น", "ลมแดด", "1", "0", ""],
            ["ขอนแก่น", " Heat Stroke. ", "1", "0", ""],
            ["ขอนแก่น", r#"["เป็นโรคลมแดด","ฮีทสโตรก"]"#, "1", "0", ""],
            ["ขอนแก่น", "Sunburn", "0", "1", ""],
            ["ขอนแก่น", "sunburn  ", "0", "1", ""],
            ["ขอนแก่น", "Cardiac arrest", "1", "0", ""],
        ];
        let vocabulary = vec!["Cardiac Arrest".to_string()];
        let summary = aggregate(&ledger(&rows), &MapSettings::default(), &vocabulary);
        let causes: Vec<(&str, usize)> = summary
            .causes
            .iter()
            .map(|c| (c.cause.as_str(), c.incidents))
            .collect();
        assert_eq!(
            causes,
            vec![("โรคลมแดด", 3), ("sunburn", 2), ("Cardiac Arrest", 1)]
        );
        assert_eq!(summary.matrix, vec![vec![3, 2, 1]]);
    }

    #[test]
    fn test_empty_ledger() {
        let summary = aggregate(&Ledger::default(), &MapSettings::default(), &[]);
        assert_eq!(summary.total_incidents, 0);
        assert!(summary.provinces.is_empty());
        assert!(render_province_map(&summary).contains("const markers = [];"));
        assert!(render_cause_matrix(&summary).contains("<table class=\"matrix\">"));
    }

    #[test]
    fn test_heat_color_and_radius() {
        assert_eq!(heat_color(0, 5), "#ffffff");
        assert_eq!(heat_color(5, 5), "#a50f15");
        assert_eq!(heat_color(1, 0), "#ffffff");
        assert!(marker_radius(100, 1) > marker_radius(1, 1));
        assert_eq!(marker_radius(10_000, 1), 40.0);
    }

    #[test]
    fn test_rendered_pages_escape_values() {
        let rows = [["ขอนแก่น", "<script>alert(1)</script>", "1", "0", ""]];
        let summary = aggregate(&ledger(&rows), &MapSettings::default(), &[]);
        let matrix = render_cause_matrix(&summary);
        assert!(matrix.contains("&lt;script&gt;"));
        assert!(!matrix.contains("<script>alert"));
        let map = render_province_map(&summary);
        assert!(map.contains("leaflet.js"));
        assert!(map.contains("<\\/script>"));
        assert!(map.contains("ขอนแก่น"));
    }
}
