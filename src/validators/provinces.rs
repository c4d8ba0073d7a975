//! Thai provinces, regions and their map centroids.

use strsim::jaro_winkler;

/// Label used when a province or region cannot be determined.
pub const UNKNOWN: &str = "ไม่ระบุ";

pub const NORTH: &str = "ภาคเหนือ";
pub const NORTHEAST: &str = "ภาคตะวันออกเฉียงเหนือ";
pub const EAST: &str = "ภาคตะวันออก";
pub const SOUTH: &str = "ภาคใต้";
pub const CENTRAL: &str = "ภาคกลางและตะวันตก";

pub const REGIONS: [&str; 5] = [NORTH, NORTHEAST, EAST, SOUTH, CENTRAL];

const FUZZY_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Province {
    pub thai: &'static str,
    pub english: &'static str,
    pub region: &'static str,
    pub lat: f64,
    pub lon: f64,
}

const fn p(thai: &'static str, english: &'static str, region: &'static str, lat: f64, lon: f64) -> Province {
    Province {
        thai,
        english,
        region,
        lat,
        lon,
    }
}

pub static PROVINCES: [Province; 77] = [
    // north
    p("เชียงใหม่", "Chiang Mai", NORTH, 18.788, 98.985),
    p("เชียงราย", "Chiang Rai", NORTH, 19.910, 99.840),
    p("ลำปาง", "Lampang", NORTH, 18.290, 99.490),
    p("ลำพูน", "Lamphun", NORTH, 18.580, 99.008),
    p("แม่ฮ่องสอน", "Mae Hong Son", NORTH, 19.301, 97.965),
    p("น่าน", "Nan", NORTH, 18.783, 100.778),
    p("พะเยา", "Phayao", NORTH, 19.166, 99.902),
    p("แพร่", "Phrae", NORTH, 18.145, 100.141),
    p("อุตรดิตถ์", "Uttaradit", NORTH, 17.620, 100.099),
    p("ตาก", "Tak", NORTH, 16.884, 99.126),
    p("สุโขทัย", "Sukhothai", NORTH, 17.007, 99.823),
    p("พิษณุโลก", "Phitsanulok", NORTH, 16.821, 100.265),
    p("พิจิตร", "Phichit", NORTH, 16.442, 100.349),
    p("กำแพงเพชร", "Kamphaeng Phet", NORTH, 16.483, 99.522),
    p("เพชรบูรณ์", "Phetchabun", NORTH, 16.419, 101.160),
    p("นครสวรรค์", "Nakhon Sawan", NORTH, 15.704, 100.137),
    p("อุทัยธานี", "Uthai Thani", NORTH, 15.379, 100.024),
    // northeast
    p("นครราชสีมา", "Nakhon Ratchasima", NORTHEAST, 14.975, 102.098),
    p("ขอนแก่น", "Khon Kaen", NORTHEAST, 16.441, 102.836),
    p("อุดรธานี", "Udon Thani", NORTHEAST, 17.415, 102.787),
    p("อุบลราชธานี", "Ubon Ratchathani", NORTHEAST, 15.244, 104.847),
    p("บุรีรัมย์", "Buri Ram", NORTHEAST, 14.993, 103.103),
    p("สุรินทร์", "Surin", NORTHEAST, 14.883, 103.494),
    p("ศรีสะเกษ", "Si Sa Ket", NORTHEAST, 15.118, 104.322),
    p("ชัยภูมิ", "Chaiyaphum", NORTHEAST, 15.806, 102.031),
    p("มหาสารคาม", "Maha Sarakham", NORTHEAST, 16.184, 103.301),
    p("ร้อยเอ็ด", "Roi Et", NORTHEAST, 16.053, 103.652),
    p("กาฬสินธุ์", "Kalasin", NORTHEAST, 16.432, 103.506),
    p("สกลนคร", "Sakon Nakhon", NORTHEAST, 17.155, 104.148),
    p("นครพนม", "Nakhon Phanom", NORTHEAST, 17.392, 104.769),
    p("มุกดาหาร", "Mukdahan", NORTHEAST, 16.545, 104.723),
    p("ยโสธร", "Yasothon", NORTHEAST, 15.794, 104.145),
    p("อำนาจเจริญ", "Amnat Charoen", NORTHEAST, 15.858, 104.628),
    p("หนองคาย", "Nong Khai", NORTHEAST, 17.878, 102.742),
    p("หนองบัวลำภู", "Nong Bua Lam Phu", NORTHEAST, 17.204, 102.441),
    p("เลย", "Loei", NORTHEAST, 17.486, 101.722),
    p("บึงกาฬ", "Bueng Kan", NORTHEAST, 18.360, 103.646),
    // east
    p("ชลบุรี", "Chon Buri", EAST, 13.361, 100.985),
    p("ระยอง", "Rayong", EAST, 12.681, 101.278),
    p("จันทบุรี", "Chanthaburi", EAST, 12.611, 102.104),
    p("ตราด", "Trat", EAST, 12.243, 102.515),
    p("ฉะเชิงเทรา", "Chachoengsao", EAST, 13.690, 101.077),
    p("ปราจีนบุรี", "Prachin Buri", EAST, 14.050, 101.372),
    p("สระแก้ว", "Sa Kaeo", EAST, 13.814, 102.073),
    // south
    p("ภูเก็ต", "Phuket", SOUTH, 7.880, 98.392),
    p("สงขลา", "Songkhla", SOUTH, 7.190, 100.595),
    p("สุราษฎร์ธานี", "Surat Thani", SOUTH, 9.139, 99.333),
    p("นครศรีธรรมราช", "Nakhon Si Thammarat", SOUTH, 8.432, 99.963),
    p("กระบี่", "Krabi", SOUTH, 8.086, 98.906),
    p("พังงา", "Phang Nga", SOUTH, 8.451, 98.525),
    p("ระนอง", "Ranong", SOUTH, 9.965, 98.635),
    p("ชุมพร", "Chumphon", SOUTH, 10.493, 99.180),
    p("ตรัง", "Trang", SOUTH, 7.559, 99.611),
    p("พัทลุง", "Phatthalung", SOUTH, 7.617, 100.077),
    p("สตูล", "Satun", SOUTH, 6.623, 100.067),
    p("ปัตตานี", "Pattani", SOUTH, 6.869, 101.250),
    p("ยะลา", "Yala", SOUTH, 6.541, 101.281),
    p("นราธิวาส", "Narathiwat", SOUTH, 6.426, 101.823),
    // central and west
    p("กรุงเทพมหานคร", "Bangkok", CENTRAL, 13.756, 100.502),
    p("นนทบุรี", "Nonthaburi", CENTRAL, 13.859, 100.521),
    p("ปทุมธานี", "Pathum Thani", CENTRAL, 14.021, 100.525),
    p("สมุทรปราการ", "Samut Prakan", CENTRAL, 13.599, 100.597),
    p("สมุทรสาคร", "Samut Sakhon", CENTRAL, 13.547, 100.274),
    p("สมุทรสงคราม", "Samut Songkhram", CENTRAL, 13.409, 100.002),
    p("นครปฐม", "Nakhon Pathom", CENTRAL, 13.820, 100.063),
    p("พระนครศรีอยุธยา", "Phra Nakhon Si Ayutthaya", CENTRAL, 14.353, 100.569),
    p("อ่างทอง", "Ang Thong", CENTRAL, 14.589, 100.455),
    p("ลพบุรี", "Lop Buri", CENTRAL, 14.799, 100.654),
    p("สิงห์บุรี", "Sing Buri", CENTRAL, 14.892, 100.397),
    p("ชัยนาท", "Chai Nat", CENTRAL, 15.186, 100.125),
    p("สระบุรี", "Saraburi", CENTRAL, 14.528, 100.910),
    p("นครนายก", "Nakhon Nayok", CENTRAL, 14.204, 101.213),
    p("สุพรรณบุรี", "Suphan Buri", CENTRAL, 14.474, 100.117),
    p("กาญจนบุรี", "Kanchanaburi", CENTRAL, 14.022, 99.532),
    p("ราชบุรี", "Ratchaburi", CENTRAL, 13.536, 99.817),
    p("เพชรบุรี", "Phetchaburi", CENTRAL, 13.112, 99.940),
    p("ประจวบคีรีขันธ์", "Prachuap Khiri Khan", CENTRAL, 11.812, 99.797),
];

/// Informal names mapped to the canonical Thai name.
const ALIASES: &[(&str, &str)] = &[
    ("กทม", "กรุงเทพมหานคร"),
    ("กทม.", "กรุงเทพมหานคร"),
    ("กรุงเทพฯ", "กรุงเทพมหานคร"),
    ("กรุงเทพ", "กรุงเทพมหานคร"),
    ("bkk", "กรุงเทพมหานคร"),
    ("โคราช", "นครราชสีมา"),
    ("korat", "นครราชสีมา"),
    ("อยุธยา", "พระนครศรีอยุธยา"),
    ("ayutthaya", "พระนครศรีอยุธยา"),
    ("อุบล", "อุบลราชธานี"),
    ("สุราษฎร์", "สุราษฎร์ธานี"),
    ("นครศรีฯ", "นครศรีธรรมราช"),
    ("ประจวบ", "ประจวบคีรีขันธ์"),
];

const REGION_ALIASES: &[(&str, &str)] = &[
    ("ภาคตะวันออกเฉียงเหนือ", NORTHEAST),
    ("ตะวันออกเฉียงเหนือ", NORTHEAST),
    ("อีสาน", NORTHEAST),
    ("northeast", NORTHEAST),
    ("north-east", NORTHEAST),
    ("northeastern", NORTHEAST),
    ("isan", NORTHEAST),
    ("ภาคเหนือ", NORTH),
    ("เหนือ", NORTH),
    ("northern", NORTH),
    ("north", NORTH),
    ("ภาคตะวันออก", EAST),
    ("ตะวันออก", EAST),
    ("eastern", EAST),
    ("east", EAST),
    ("ภาคใต้", SOUTH),
    ("ใต้", SOUTH),
    ("southern", SOUTH),
    ("south", SOUTH),
    ("ภาคกลางและตะวันตก", CENTRAL),
    ("ภาคกลาง", CENTRAL),
    ("ภาคตะวันตก", CENTRAL),
    ("กลาง", CENTRAL),
    ("central", CENTRAL),
    ("western", CENTRAL),
    ("west", CENTRAL),
];

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn strip_prefix(raw: &str) -> &str {
    let trimmed = raw.trim();
    for prefix in ["จังหวัด", "จ.", "จ ", "province of "] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest.trim();
        }
    }
    for suffix in [" province", " Province"] {
        if let Some(rest) = trimmed.strip_suffix(suffix) {
            return rest.trim();
        }
    }
    trimmed
}

/// Province by its canonical Thai name.
pub fn lookup(thai: &str) -> Option<&'static Province> {
    PROVINCES.iter().find(|p| p.thai == thai)
}

/// Resolve free text to a province.
///
/// Tries, in order: exact Thai name, alias, English name, a Thai name or alias
/// contained in the text (longest wins), then Jaro-Winkler similarity.
pub fn normalize_province(raw: &str) -> Option<&'static Province> {
    let name = strip_prefix(raw);
    if name.is_empty() {
        return None;
    }
    if let Some(p) = lookup(name) {
        return Some(p);
    }
    let squashed = squash(name);
    if let Some((_, canonical)) = ALIASES.iter().find(|(alias, _)| squash(alias) == squashed) {
        return lookup(canonical);
    }
    if let Some(p) = PROVINCES.iter().find(|p| squash(p.english) == squashed) {
        return Some(p);
    }

    let contained = PROVINCES
        .iter()
        .map(|p| (p.thai, p.thai))
        .chain(ALIASES.iter().copied())
        .filter(|(needle, _)| name.contains(needle))
        .max_by_key(|(needle, _)| needle.chars().count());
    if let Some((_, canonical)) = contained {
        return lookup(canonical);
    }

    PROVINCES
        .iter()
        .map(|p| {
            let score = jaro_winkler(name, p.thai).max(jaro_winkler(&squashed, &squash(p.english)));
            (p, score)
        })
        .filter(|(_, score)| *score >= FUZZY_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(p, _)| p)
}

/// Region of a canonical province name.
pub fn province_region(name: &str) -> Option<&'static str> {
    lookup(name)
        .or_else(|| normalize_province(name))
        .map(|p| p.region)
}

/// Resolve free text to one of the five canonical regions.
pub fn normalize_region(raw: &str) -> Option<&'static str> {
    let lower = raw.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    if let Some((_, region)) = REGION_ALIASES.iter().find(|(alias, _)| *alias == lower) {
        return Some(*region);
    }
    // Aliases are ordered so that "northeast" is tried before "north".
    REGION_ALIASES
        .iter()
        .find(|(alias, _)| lower.contains(alias))
        .map(|(_, region)| *region)
        .or_else(|| normalize_province(raw).map(|p| p.region))
}
