//! 国家名 → ISO3 映射
//!
//! 上游以葡萄牙语国家名作为挑战描述。查找区分大小写、精确匹配，
//! 表中同时收录了上游实际使用的拼写变体和常见别名。

use std::collections::HashMap;
use std::sync::LazyLock;

/// (国家名, ISO3)
const COUNTRIES: &[(&str, &str)] = &[
    // 南美
    ("Brasil", "BRA"),
    ("Guiana Francesa", "GUF"),
    ("Suriname", "SUR"),
    ("Guiana", "GUY"),
    ("Venezuela", "VEN"),
    ("Colômbia", "COL"),
    ("Equador", "ECU"),
    ("Peru", "PER"),
    ("Bolívia", "BOL"),
    ("Chile", "CHL"),
    ("Paraguai", "PRY"),
    ("Argentina", "ARG"),
    ("Uruguai", "URY"),
    // 亚洲
    ("China", "CHN"),
    ("Japão", "JPN"),
    ("Coreia do Sul", "KOR"),
    ("Coreia do Norte", "PRK"),
    ("Filipinas", "PHL"),
    ("Indonésia", "IDN"),
    ("Butão", "BTN"),
    ("Mongólia", "MNG"),
    ("Laos", "LAO"),
    ("Nepal", "NPL"),
    ("Vietnã", "VNM"),
    ("Brunei", "BRN"),
    ("Malásia", "MYS"),
    ("Timor Leste", "TLS"),
    ("Timor-Leste", "TLS"),
    ("Cazaquistão", "KAZ"),
    ("Camboja", "KHM"),
    ("Tailândia", "THA"),
    ("Mianmar", "MMR"),
    ("Singapura", "SGP"),
    ("Taiwan", "TWN"),
    // 南欧
    ("Portugal", "PRT"),
    ("Espanha", "ESP"),
    ("França", "FRA"),
    ("Andorra", "AND"),
    ("Mônaco", "MCO"),
    ("Itália", "ITA"),
    ("Malta", "MLT"),
    ("Vaticano", "VAT"),
    ("San Marino", "SMR"),
    // 中部、南部非洲
    ("Guiné Equatorial", "GNQ"),
    ("Gabão", "GAB"),
    ("Congo", "COG"),
    ("República do Congo", "COG"),
    ("República Democrática do Congo", "COD"),
    ("Uganda", "UGA"),
    ("Quênia", "KEN"),
    ("Ruanda", "RWA"),
    ("Burundi", "BDI"),
    ("Tanzânia", "TZA"),
    ("Angola", "AGO"),
    ("Zâmbia", "ZMB"),
    ("Malawi", "MWI"),
    ("Moçambique", "MOZ"),
    ("Zimbábue", "ZWE"),
    ("Botsuana", "BWA"),
    ("Namíbia", "NAM"),
    ("África do Sul", "ZAF"),
    ("Lesoto", "LSO"),
    ("Essuatíni", "SWZ"),
    ("Suazilândia", "SWZ"),
    ("Madagascar", "MDG"),
    ("São Tomé e Príncipe", "STP"),
    ("Seychelles", "SYC"),
    ("Comores", "COM"),
    ("Maurício", "MUS"),
    // 中美、加勒比
    ("Guatemala", "GTM"),
    ("Belize", "BLZ"),
    ("El Salvador", "SLV"),
    ("Honduras", "HND"),
    ("Nicarágua", "NIC"),
    ("Costa Rica", "CRI"),
    ("Panamá", "PAN"),
    ("Bahamas", "BHS"),
    ("Cuba", "CUB"),
    ("Jamaica", "JAM"),
    ("Haiti", "HTI"),
    ("República Dominicana", "DOM"),
    ("Porto Rico", "PRI"),
    ("São Cristóvão e Névis", "KNA"),
    ("Antígua e Barbuda", "ATG"),
    ("Montserrat", "MSR"),
    ("Dominica", "DMA"),
    ("Santa Lúcia", "LCA"),
    ("Barbados", "BRB"),
    ("Granada", "GRD"),
    ("Trindade e Tobago", "TTO"),
    ("São Vicente e Grandinas", "VCT"),
    ("São Vicente e Granadinas", "VCT"),
    // 英伦、北欧
    ("Reino Unido", "GBR"),
    ("Inglaterra", "GBR"),
    ("Escócia", "GBR"),
    ("País de Gales", "GBR"),
    ("Irlanda do Norte", "GBR"),
    ("Irlanda do norte", "GBR"),
    ("irlanda do norte", "GBR"),
    ("Irlanda", "IRL"),
    ("Islândia", "ISL"),
    ("Noruega", "NOR"),
    ("Suécia", "SWE"),
    ("Finlândia", "FIN"),
    // 北美
    ("Canadá", "CAN"),
    ("Estados Unidos", "USA"),
    ("Alasca", "USA"),
    ("México", "MEX"),
    ("Groelândia", "GRL"),
    ("Groenlândia", "GRL"),
    // 大洋洲
    ("Austrália", "AUS"),
    ("Papua-Nova Guiné", "PNG"),
    ("Papua Nova Guiné", "PNG"),
    ("Nova Zelândia", "NZL"),
    ("Fiji", "FJI"),
    ("Ilhas Salomão", "SLB"),
    ("Vanuatu", "VUT"),
    ("Samoa", "WSM"),
    ("Kiribati", "KIR"),
    ("Tonga", "TON"),
    ("Micronésia", "FSM"),
    ("Palau", "PLW"),
    ("Ilhas Marshall", "MHL"),
    ("Nauru", "NRU"),
    ("Tuvalu", "TUV"),
    // 西欧、中欧
    ("Suiça", "CHE"),
    ("Suíça", "CHE"),
    ("Bélgica", "BEL"),
    ("Luxemburgo", "LUX"),
    ("Países Baixos", "NLD"),
    ("Holanda", "NLD"),
    ("Alemanha", "DEU"),
    ("Dinamarca", "DNK"),
    ("Polônia", "POL"),
    ("Tchéquia", "CZE"),
    ("República Tcheca", "CZE"),
    ("Áustria", "AUT"),
    ("Liechtenstein", "LIE"),
    // 东欧、巴尔干
    ("Eslováquia", "SVK"),
    ("Hungria", "HUN"),
    ("Eslovênia", "SVN"),
    ("Croácia", "HRV"),
    ("Bósnia-Herzegóvina", "BIH"),
    ("Bósnia e Herzegovina", "BIH"),
    ("Montenegro", "MNE"),
    ("Sérvia", "SRB"),
    ("Albânia", "ALB"),
    ("Grécia", "GRC"),
    ("Macedônia do Norte", "MKD"),
    ("Bulgária", "BGR"),
    ("Romênia", "ROU"),
    ("Moldávia", "MDA"),
    ("Ucrânia", "UKR"),
    ("Bielorrússia", "BLR"),
    ("Lituânia", "LTU"),
    ("Letônia", "LVA"),
    ("Estônia", "EST"),
    ("Rússia", "RUS"),
    ("Kosovo", "XKX"),
    // 北非、西非、东非
    ("Marrocos", "MAR"),
    ("Argélia", "DZA"),
    ("Tunísia", "TUN"),
    ("Saara Ocidental", "ESH"),
    ("Mauritânia", "MRT"),
    ("Senegal", "SEN"),
    ("Gâmbia", "GMB"),
    ("Guiné-Bissau", "GNB"),
    ("Guiné", "GIN"),
    ("Serra Leoa", "SLE"),
    ("Libéria", "LBR"),
    ("Costa do Marfim", "CIV"),
    ("Mali", "MLI"),
    ("Burkina Faso", "BFA"),
    ("Gana", "GHA"),
    ("Togo", "TGO"),
    ("Benin", "BEN"),
    ("Níger", "NER"),
    ("Nigéria", "NGA"),
    ("Líbia", "LBY"),
    ("Chade", "TCD"),
    ("Camarões", "CMR"),
    ("República Centro-Africana", "CAF"),
    ("Egito", "EGY"),
    ("Sudão", "SDN"),
    ("Sudão do Sul", "SSD"),
    ("Etiópia", "ETH"),
    ("Somália", "SOM"),
    ("Eritreia", "ERI"),
    ("Djibouti", "DJI"),
    ("Cabo verde", "CPV"),
    ("Cabo Verde", "CPV"),
    // 中东、中亚、南亚
    ("Turquia", "TUR"),
    ("Chipre", "CYP"),
    ("Líbano", "LBN"),
    ("Israel", "ISR"),
    ("Palestina", "PSE"),
    ("Jordânia", "JOR"),
    ("Síria", "SYR"),
    ("Iraque", "IRQ"),
    ("Irã", "IRN"),
    ("Geórgia", "GEO"),
    ("Armênia", "ARM"),
    ("Azerbajão", "AZE"),
    ("Azerbaijão", "AZE"),
    ("Turcomenistão", "TKM"),
    ("Uzbequistão", "UZB"),
    ("Afeganistão", "AFG"),
    ("Tajiquistão", "TJK"),
    ("Quirguistão", "KGZ"),
    ("Paquistão", "PAK"),
    ("Arábia Saudita", "SAU"),
    ("Kuwait", "KWT"),
    ("Bahrein", "BHR"),
    ("Catar", "QAT"),
    ("Emirados Árabes", "ARE"),
    ("Emirados Árabes Unidos", "ARE"),
    ("Omã", "OMN"),
    ("Iêmen", "YEM"),
    ("Índia", "IND"),
    ("Sri Lanka", "LKA"),
    ("Maldivas", "MDV"),
    ("Bangladesh", "BGD"),
];

static NAME_TO_ISO: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| COUNTRIES.iter().copied().collect());

/// 查找国家名对应的 ISO3 代码，未收录时返回 `None`
pub fn resolve_iso3(name: &str) -> Option<&'static str> {
    NAME_TO_ISO.get(name).copied()
}

/// 映射表条目数
pub fn known_country_count() -> usize {
    NAME_TO_ISO.len()
}
