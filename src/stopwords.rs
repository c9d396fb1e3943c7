use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

const EN: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

const ES: &[&str] = &[
    "a", "al", "algo", "ante", "como", "con", "contra", "cual", "de", "del", "desde", "donde",
    "el", "ella", "ellas", "ellos", "en", "entre", "era", "es", "esa", "ese", "eso", "esta",
    "este", "esto", "fue", "ha", "hasta", "hay", "la", "las", "le", "les", "lo", "los", "mas",
    "me", "mi", "mucho", "muy", "nada", "ni", "no", "nos", "o", "os", "otro", "para", "pero",
    "poco", "por", "porque", "que", "quien", "se", "ser", "si", "sin", "sobre", "su", "sus",
    "también", "te", "tu", "un", "una", "uno", "unos", "y", "ya", "yo",
];

const FR: &[&str] = &[
    "a", "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "est", "et",
    "eux", "il", "ils", "je", "la", "le", "les", "leur", "lui", "ma", "mais", "me", "mes", "moi",
    "mon", "ne", "nos", "notre", "nous", "on", "ou", "par", "pas", "pour", "qu", "que", "qui",
    "sa", "se", "ses", "son", "sur", "ta", "te", "tes", "toi", "ton", "tu", "un", "une", "vos",
    "votre", "vous", "c", "d", "j", "l", "m", "n", "s", "t", "y", "été", "être", "avoir",
];

const DE: &[&str] = &[
    "aber", "alle", "als", "also", "am", "an", "auch", "auf", "aus", "bei", "bin", "bis", "da",
    "das", "dass", "dem", "den", "der", "des", "die", "doch", "du", "ein", "eine", "einem",
    "einen", "einer", "er", "es", "für", "hat", "ich", "ihr", "im", "in", "ist", "ja", "kein",
    "man", "mit", "nach", "nicht", "noch", "nur", "oder", "sich", "sie", "sind", "so", "um",
    "und", "uns", "von", "vor", "war", "was", "wie", "wir", "wird", "zu", "zum", "zur",
];

const IT: &[&str] = &[
    "a", "ad", "al", "alla", "anche", "che", "chi", "ci", "come", "con", "da", "dal", "dei",
    "del", "della", "di", "e", "è", "ed", "gli", "ha", "i", "il", "in", "io", "la", "le", "lo",
    "ma", "mi", "ne", "nel", "nella", "non", "o", "per", "più", "se", "si", "sono", "su", "sua",
    "suo", "tu", "un", "una", "uno",
];

const PT: &[&str] = &[
    "a", "ao", "as", "com", "como", "da", "das", "de", "do", "dos", "e", "é", "ela", "ele", "em",
    "entre", "era", "eu", "foi", "há", "isso", "já", "lhe", "mais", "mas", "me", "meu", "na",
    "nas", "não", "no", "nos", "o", "os", "ou", "para", "pela", "pelo", "por", "que", "se",
    "sem", "seu", "sua", "também", "te", "um", "uma", "você",
];

const NL: &[&str] = &[
    "aan", "al", "als", "bij", "dat", "de", "den", "der", "die", "dit", "doch", "door", "een",
    "en", "er", "had", "heb", "het", "hij", "hoe", "ik", "in", "is", "je", "kan", "maar", "me",
    "met", "mij", "naar", "niet", "nog", "nu", "of", "om", "ons", "ook", "op", "over", "te",
    "tot", "uit", "van", "voor", "was", "wat", "we", "wel", "wij", "zal", "ze", "zich", "zij",
    "zijn", "zo",
];

const RU: &[&str] = &[
    "а", "без", "бы", "в", "вам", "вас", "во", "вот", "все", "вы", "да", "для", "до", "его",
    "ее", "если", "есть", "же", "за", "и", "из", "или", "им", "их", "к", "как", "когда", "ли",
    "мы", "на", "не", "нет", "ни", "но", "о", "об", "он", "она", "они", "от", "по", "при", "с",
    "так", "то", "только", "у", "уже", "что", "это", "я",
];

lazy_static! {
    static ref STOPWORDS: HashMap<&'static str, HashSet<&'static str>> = {
        let mut map = HashMap::new();
        for (locale, words) in [
            ("en", EN),
            ("es", ES),
            ("fr", FR),
            ("de", DE),
            ("it", IT),
            ("pt", PT),
            ("nl", NL),
            ("ru", RU),
        ] {
            map.insert(locale, words.iter().copied().collect());
        }
        map
    };
}

/// Whether `word` is a stopword for `locale`. Locales without a list keep every word.
pub fn is_stopword(locale: &str, word: &str) -> bool {
    STOPWORDS
        .get(locale)
        .is_some_and(|words| words.contains(word))
}
