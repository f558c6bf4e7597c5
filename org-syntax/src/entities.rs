//! Named symbolic entities (`\alpha`, `\rarr`, `\nbsp`, ...).
//!
//! The table is process-wide and read-only; it is built on first use and never mutated.

use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entity {
    pub name: &'static str,
    pub latex: &'static str,
    /// Whether `latex` must be typeset in math mode.
    pub latex_math: bool,
    pub html: &'static str,
    pub utf8: &'static str,
}

/// Look up an entity by its exact (case-sensitive) name.
pub fn lookup(name: &str) -> Option<&'static Entity> {
    TABLE.get(name)
}

pub fn is_entity(name: &str) -> bool {
    TABLE.contains_key(name)
}

static TABLE: Lazy<HashMap<&'static str, Entity>> = Lazy::new(|| {
    ENTRIES
        .iter()
        .map(|&(name, latex, latex_math, html, utf8)| {
            (
                name,
                Entity {
                    name,
                    latex,
                    latex_math,
                    html,
                    utf8,
                },
            )
        })
        .collect()
});

type Row = (
    &'static str,
    &'static str,
    bool,
    &'static str,
    &'static str,
);

#[rustfmt::skip]
const ENTRIES: &[Row] = &[
    /* Latin */
    ("Agrave", "\\`{A}", false, "&Agrave;", "À"),
    ("agrave", "\\`{a}", false, "&agrave;", "à"),
    ("Aacute", "\\'{A}", false, "&Aacute;", "Á"),
    ("aacute", "\\'{a}", false, "&aacute;", "á"),
    ("Acirc", "\\^{A}", false, "&Acirc;", "Â"),
    ("acirc", "\\^{a}", false, "&acirc;", "â"),
    ("Atilde", "\\~{A}", false, "&Atilde;", "Ã"),
    ("atilde", "\\~{a}", false, "&atilde;", "ã"),
    ("Auml", "\\\"{A}", false, "&Auml;", "Ä"),
    ("auml", "\\\"{a}", false, "&auml;", "ä"),
    ("Aring", "\\AA{}", false, "&Aring;", "Å"),
    ("aring", "\\aa{}", false, "&aring;", "å"),
    ("AElig", "\\AE{}", false, "&AElig;", "Æ"),
    ("aelig", "\\ae{}", false, "&aelig;", "æ"),
    ("Ccedil", "\\c{C}", false, "&Ccedil;", "Ç"),
    ("ccedil", "\\c{c}", false, "&ccedil;", "ç"),
    ("Egrave", "\\`{E}", false, "&Egrave;", "È"),
    ("egrave", "\\`{e}", false, "&egrave;", "è"),
    ("Eacute", "\\'{E}", false, "&Eacute;", "É"),
    ("eacute", "\\'{e}", false, "&eacute;", "é"),
    ("Ecirc", "\\^{E}", false, "&Ecirc;", "Ê"),
    ("ecirc", "\\^{e}", false, "&ecirc;", "ê"),
    ("Euml", "\\\"{E}", false, "&Euml;", "Ë"),
    ("euml", "\\\"{e}", false, "&euml;", "ë"),
    ("Igrave", "\\`{I}", false, "&Igrave;", "Ì"),
    ("igrave", "\\`{i}", false, "&igrave;", "ì"),
    ("Iacute", "\\'{I}", false, "&Iacute;", "Í"),
    ("iacute", "\\'{i}", false, "&iacute;", "í"),
    ("Icirc", "\\^{I}", false, "&Icirc;", "Î"),
    ("icirc", "\\^{i}", false, "&icirc;", "î"),
    ("Iuml", "\\\"{I}", false, "&Iuml;", "Ï"),
    ("iuml", "\\\"{i}", false, "&iuml;", "ï"),
    ("Ntilde", "\\~{N}", false, "&Ntilde;", "Ñ"),
    ("ntilde", "\\~{n}", false, "&ntilde;", "ñ"),
    ("Ograve", "\\`{O}", false, "&Ograve;", "Ò"),
    ("ograve", "\\`{o}", false, "&ograve;", "ò"),
    ("Oacute", "\\'{O}", false, "&Oacute;", "Ó"),
    ("oacute", "\\'{o}", false, "&oacute;", "ó"),
    ("Ocirc", "\\^{O}", false, "&Ocirc;", "Ô"),
    ("ocirc", "\\^{o}", false, "&ocirc;", "ô"),
    ("Otilde", "\\~{O}", false, "&Otilde;", "Õ"),
    ("otilde", "\\~{o}", false, "&otilde;", "õ"),
    ("Ouml", "\\\"{O}", false, "&Ouml;", "Ö"),
    ("ouml", "\\\"{o}", false, "&ouml;", "ö"),
    ("Oslash", "\\O", false, "&Oslash;", "Ø"),
    ("oslash", "\\o{}", false, "&oslash;", "ø"),
    ("OElig", "\\OE{}", false, "&OElig;", "Œ"),
    ("oelig", "\\oe{}", false, "&oelig;", "œ"),
    ("Scaron", "\\v{S}", false, "&Scaron;", "Š"),
    ("scaron", "\\v{s}", false, "&scaron;", "š"),
    ("szlig", "\\ss{}", false, "&szlig;", "ß"),
    ("Ugrave", "\\`{U}", false, "&Ugrave;", "Ù"),
    ("ugrave", "\\`{u}", false, "&ugrave;", "ù"),
    ("Uacute", "\\'{U}", false, "&Uacute;", "Ú"),
    ("uacute", "\\'{u}", false, "&uacute;", "ú"),
    ("Ucirc", "\\^{U}", false, "&Ucirc;", "Û"),
    ("ucirc", "\\^{u}", false, "&ucirc;", "û"),
    ("Uuml", "\\\"{U}", false, "&Uuml;", "Ü"),
    ("uuml", "\\\"{u}", false, "&uuml;", "ü"),
    ("Yacute", "\\'{Y}", false, "&Yacute;", "Ý"),
    ("yacute", "\\'{y}", false, "&yacute;", "ý"),
    ("Yuml", "\\\"{Y}", false, "&Yuml;", "Ÿ"),
    ("yuml", "\\\"{y}", false, "&yuml;", "ÿ"),
    ("fnof", "\\textit{f}", false, "&fnof;", "ƒ"),
    ("real", "\\Re", true, "&real;", "ℜ"),
    ("image", "\\Im", true, "&image;", "ℑ"),
    ("weierp", "\\wp", true, "&weierp;", "℘"),
    ("ell", "\\ell", true, "&ell;", "ℓ"),
    ("imath", "\\imath", true, "&imath;", "ı"),
    ("jmath", "\\jmath", true, "&jmath;", "ȷ"),

    /* Greek */
    ("Alpha", "A", false, "&Alpha;", "Α"),
    ("alpha", "\\alpha", true, "&alpha;", "α"),
    ("Beta", "B", false, "&Beta;", "Β"),
    ("beta", "\\beta", true, "&beta;", "β"),
    ("Gamma", "\\Gamma", true, "&Gamma;", "Γ"),
    ("gamma", "\\gamma", true, "&gamma;", "γ"),
    ("Delta", "\\Delta", true, "&Delta;", "Δ"),
    ("delta", "\\delta", true, "&delta;", "δ"),
    ("Epsilon", "E", false, "&Epsilon;", "Ε"),
    ("epsilon", "\\epsilon", true, "&epsilon;", "ε"),
    ("varepsilon", "\\varepsilon", true, "&epsilon;", "ε"),
    ("Zeta", "Z", false, "&Zeta;", "Ζ"),
    ("zeta", "\\zeta", true, "&zeta;", "ζ"),
    ("Eta", "H", false, "&Eta;", "Η"),
    ("eta", "\\eta", true, "&eta;", "η"),
    ("Theta", "\\Theta", true, "&Theta;", "Θ"),
    ("theta", "\\theta", true, "&theta;", "θ"),
    ("thetasym", "\\vartheta", true, "&thetasym;", "ϑ"),
    ("vartheta", "\\vartheta", true, "&thetasym;", "ϑ"),
    ("Iota", "I", false, "&Iota;", "Ι"),
    ("iota", "\\iota", true, "&iota;", "ι"),
    ("Kappa", "K", false, "&Kappa;", "Κ"),
    ("kappa", "\\kappa", true, "&kappa;", "κ"),
    ("Lambda", "\\Lambda", true, "&Lambda;", "Λ"),
    ("lambda", "\\lambda", true, "&lambda;", "λ"),
    ("Mu", "M", false, "&Mu;", "Μ"),
    ("mu", "\\mu", true, "&mu;", "μ"),
    ("nu", "\\nu", true, "&nu;", "ν"),
    ("Nu", "N", false, "&Nu;", "Ν"),
    ("Xi", "\\Xi", true, "&Xi;", "Ξ"),
    ("xi", "\\xi", true, "&xi;", "ξ"),
    ("Omicron", "O", false, "&Omicron;", "Ο"),
    ("omicron", "\\textit{o}", false, "&omicron;", "ο"),
    ("Pi", "\\Pi", true, "&Pi;", "Π"),
    ("pi", "\\pi", true, "&pi;", "π"),
    ("Rho", "P", false, "&Rho;", "Ρ"),
    ("rho", "\\rho", true, "&rho;", "ρ"),
    ("Sigma", "\\Sigma", true, "&Sigma;", "Σ"),
    ("sigma", "\\sigma", true, "&sigma;", "σ"),
    ("sigmaf", "\\varsigma", true, "&sigmaf;", "ς"),
    ("varsigma", "\\varsigma", true, "&sigmaf;", "ς"),
    ("Tau", "T", false, "&Tau;", "Τ"),
    ("tau", "\\tau", true, "&tau;", "τ"),
    ("Upsilon", "\\Upsilon", true, "&Upsilon;", "Υ"),
    ("upsilon", "\\upsilon", true, "&upsilon;", "υ"),
    ("Phi", "\\Phi", true, "&Phi;", "Φ"),
    ("phi", "\\phi", true, "&phi;", "ɸ"),
    ("varphi", "\\varphi", true, "&varphi;", "φ"),
    ("Chi", "X", false, "&Chi;", "Χ"),
    ("chi", "\\chi", true, "&chi;", "χ"),
    ("Psi", "\\Psi", true, "&Psi;", "Ψ"),
    ("psi", "\\psi", true, "&psi;", "ψ"),
    ("Omega", "\\Omega", true, "&Omega;", "Ω"),
    ("omega", "\\omega", true, "&omega;", "ω"),
    ("piv", "\\varpi", true, "&piv;", "ϖ"),
    ("varpi", "\\varpi", true, "&piv;", "ϖ"),
    ("partial", "\\partial", true, "&part;", "∂"),
    ("aleph", "\\aleph", true, "&alefsym;", "ℵ"),
    ("gimel", "\\gimel", true, "&gimel;", "ℷ"),
    ("beth", "\\beth", true, "&beth;", "ב"),
    ("dalet", "\\daleth", true, "&daleth;", "ד"),

    /* Dashes, quotes and spacing */
    ("nbsp", "~", false, "&nbsp;", "\u{a0}"),
    ("ensp", "\\hspace*{.5em}", false, "&ensp;", "\u{2002}"),
    ("emsp", "\\hspace*{1em}", false, "&emsp;", "\u{2003}"),
    ("thinsp", "\\hspace*{.2em}", false, "&thinsp;", "\u{2009}"),
    ("shy", "\\-", false, "&shy;", "\u{ad}"),
    ("ndash", "--", false, "&ndash;", "–"),
    ("mdash", "---", false, "&mdash;", "—"),
    ("hyphen", "-", false, "&#45;", "-"),
    ("iexcl", "!`", false, "&iexcl;", "¡"),
    ("iquest", "?`", false, "&iquest;", "¿"),
    ("quot", "\\textquotedbl{}", false, "&quot;", "\""),
    ("acute", "\\textasciiacute{}", false, "&acute;", "´"),
    ("ldquo", "\\textquotedblleft{}", false, "&ldquo;", "“"),
    ("rdquo", "\\textquotedblright{}", false, "&rdquo;", "”"),
    ("bdquo", "\\quotedblbase{}", false, "&bdquo;", "„"),
    ("lsquo", "\\textquoteleft{}", false, "&lsquo;", "‘"),
    ("rsquo", "\\textquoteright{}", false, "&rsquo;", "’"),
    ("sbquo", "\\quotesinglbase{}", false, "&sbquo;", "‚"),
    ("laquo", "\\guillemotleft{}", false, "&laquo;", "«"),
    ("raquo", "\\guillemotright{}", false, "&raquo;", "»"),
    ("lsaquo", "\\guilsinglleft{}", false, "&lsaquo;", "‹"),
    ("rsaquo", "\\guilsinglright{}", false, "&rsaquo;", "›"),

    /* Other punctuation and symbols */
    ("dagger", "\\textdagger{}", false, "&dagger;", "†"),
    ("Dagger", "\\textdaggerdbl{}", false, "&Dagger;", "‡"),
    ("bull", "\\textbullet{}", false, "&bull;", "•"),
    ("bullet", "\\textbullet{}", false, "&bull;", "•"),
    ("hellip", "\\dots{}", false, "&hellip;", "…"),
    ("dots", "\\dots{}", false, "&hellip;", "…"),
    ("prime", "\\prime", true, "&prime;", "′"),
    ("Prime", "\\prime{}\\prime", true, "&Prime;", "″"),
    ("oline", "\\overline{~}", true, "&oline;", "‾"),
    ("frasl", "/", false, "&frasl;", "⁄"),
    ("sect", "\\S", false, "&sect;", "§"),
    ("para", "\\P{}", false, "&para;", "¶"),
    ("middot", "\\textperiodcentered{}", false, "&middot;", "·"),
    ("copy", "\\textcopyright{}", false, "&copy;", "©"),
    ("reg", "\\textregistered{}", false, "&reg;", "®"),
    ("trade", "\\texttrademark{}", false, "&trade;", "™"),
    ("deg", "\\textdegree{}", false, "&deg;", "°"),
    ("pound", "\\pounds{}", false, "&pound;", "£"),
    ("cent", "\\textcent{}", false, "&cent;", "¢"),
    ("yen", "\\textyen{}", false, "&yen;", "¥"),
    ("euro", "\\texteuro{}", false, "&euro;", "€"),
    ("EUR", "\\texteuro{}", false, "&euro;", "€"),
    ("dollar", "\\$", false, "&#36;", "$"),
    ("curren", "\\textcurrency{}", false, "&curren;", "¤"),
    ("brvbar", "\\textbrokenbar{}", false, "&brvbar;", "¦"),
    ("vbar", "|", true, "&#124;", "|"),
    ("vert", "\\vert{}", true, "&#124;", "|"),
    ("amp", "\\&", false, "&amp;", "&"),
    ("lt", "\\textless{}", false, "&lt;", "<"),
    ("gt", "\\textgreater{}", false, "&gt;", ">"),
    ("ordf", "\\textordfeminine{}", false, "&ordf;", "ª"),
    ("ordm", "\\textordmasculine{}", false, "&ordm;", "º"),
    ("star", "\\star", true, "*", "⋆"),
    ("smile", "\\smile", true, "&#9786;", "⌣"),
    ("checkmark", "\\checkmark", true, "&#10003;", "✓"),
    ("clubs", "\\clubsuit", true, "&clubs;", "♣"),
    ("spades", "\\spadesuit", true, "&spades;", "♠"),
    ("hearts", "\\heartsuit", true, "&hearts;", "♥"),
    ("diams", "\\diamondsuit", true, "&diams;", "♦"),

    /* Math: relations and operators */
    ("times", "\\times", true, "&times;", "×"),
    ("divide", "\\div", true, "&divide;", "÷"),
    ("div", "\\div", true, "&divide;", "÷"),
    ("pm", "\\textpm{}", false, "&plusmn;", "±"),
    ("plusmn", "\\textpm{}", false, "&plusmn;", "±"),
    ("mp", "\\mp", true, "&#8723;", "∓"),
    ("minus", "\\minus", true, "&minus;", "−"),
    ("ast", "\\ast", true, "&lowast;", "∗"),
    ("lowast", "\\ast", true, "&lowast;", "∗"),
    ("radic", "\\sqrt{\\,}", true, "&radic;", "√"),
    ("sum", "\\sum", true, "&sum;", "∑"),
    ("prod", "\\prod", true, "&prod;", "∏"),
    ("int", "\\int", true, "&int;", "∫"),
    ("oint", "\\oint", true, "&#8750;", "∮"),
    ("infin", "\\infty", true, "&infin;", "∞"),
    ("infty", "\\infty", true, "&infin;", "∞"),
    ("prop", "\\propto", true, "&prop;", "∝"),
    ("propto", "\\propto", true, "&prop;", "∝"),
    ("nabla", "\\nabla", true, "&nabla;", "∇"),
    ("forall", "\\forall", true, "&forall;", "∀"),
    ("exist", "\\exists", true, "&exist;", "∃"),
    ("exists", "\\exists", true, "&exist;", "∃"),
    ("nexist", "\\nexists", true, "&exist;", "∄"),
    ("empty", "\\emptyset", true, "&empty;", "∅"),
    ("emptyset", "\\emptyset", true, "&empty;", "∅"),
    ("isin", "\\in", true, "&isin;", "∈"),
    ("in", "\\in", true, "&isin;", "∈"),
    ("notin", "\\notin", true, "&notin;", "∉"),
    ("ni", "\\ni", true, "&ni;", "∋"),
    ("and", "\\wedge", true, "&and;", "∧"),
    ("wedge", "\\wedge", true, "&and;", "∧"),
    ("or", "\\vee", true, "&or;", "∨"),
    ("vee", "\\vee", true, "&or;", "∨"),
    ("cap", "\\cap", true, "&cap;", "∩"),
    ("cup", "\\cup", true, "&cup;", "∪"),
    ("sub", "\\subset", true, "&sub;", "⊂"),
    ("subset", "\\subset", true, "&sub;", "⊂"),
    ("sup", "\\supset", true, "&sup;", "⊃"),
    ("supset", "\\supset", true, "&sup;", "⊃"),
    ("sube", "\\subseteq", true, "&sube;", "⊆"),
    ("supe", "\\supseteq", true, "&supe;", "⊇"),
    ("oplus", "\\oplus", true, "&oplus;", "⊕"),
    ("otimes", "\\otimes", true, "&otimes;", "⊗"),
    ("perp", "\\perp", true, "&perp;", "⊥"),
    ("sdot", "\\cdot", true, "&sdot;", "⋅"),
    ("cdot", "\\cdot", true, "&sdot;", "⋅"),
    ("sim", "\\sim", true, "&sim;", "∼"),
    ("cong", "\\cong", true, "&cong;", "≅"),
    ("asymp", "\\asymp", true, "&asymp;", "≈"),
    ("approx", "\\approx", true, "&asymp;", "≈"),
    ("ne", "\\ne", true, "&ne;", "≠"),
    ("neq", "\\neq", true, "&ne;", "≠"),
    ("equiv", "\\equiv", true, "&equiv;", "≡"),
    ("le", "\\le", true, "&le;", "≤"),
    ("leq", "\\le", true, "&le;", "≤"),
    ("ge", "\\ge", true, "&ge;", "≥"),
    ("geq", "\\ge", true, "&ge;", "≥"),
    ("ll", "\\ll", true, "&Lt;", "≪"),
    ("gg", "\\gg", true, "&Gt;", "≫"),
    ("not", "\\textlnot{}", false, "&not;", "¬"),
    ("neg", "\\neg{}", true, "&not;", "¬"),
    ("there4", "\\therefore", true, "&there4;", "∴"),
    ("therefore", "\\therefore", true, "&there4;", "∴"),
    ("because", "\\because", true, "&because;", "∵"),
    ("ang", "\\angle", true, "&ang;", "∠"),
    ("angle", "\\angle", true, "&ang;", "∠"),
    ("lceil", "\\lceil", true, "&lceil;", "⌈"),
    ("rceil", "\\rceil", true, "&rceil;", "⌉"),
    ("lfloor", "\\lfloor", true, "&lfloor;", "⌊"),
    ("rfloor", "\\rfloor", true, "&rfloor;", "⌋"),
    ("lang", "\\langle", true, "&lang;", "⟨"),
    ("rang", "\\rangle", true, "&rang;", "⟩"),
    ("langle", "\\langle", true, "&lang;", "⟨"),
    ("rangle", "\\rangle", true, "&rang;", "⟩"),
    ("hbar", "\\hbar", true, "&hbar;", "ℏ"),
    ("mho", "\\mho", true, "&mho;", "℧"),
    ("frac12", "\\textonehalf{}", false, "&frac12;", "½"),
    ("frac14", "\\textonequarter{}", false, "&frac14;", "¼"),
    ("frac34", "\\textthreequarters{}", false, "&frac34;", "¾"),
    ("sup1", "\\textonesuperior{}", false, "&sup1;", "¹"),
    ("sup2", "\\texttwosuperior{}", false, "&sup2;", "²"),
    ("sup3", "\\textthreesuperior{}", false, "&sup3;", "³"),
    ("permil", "\\textperthousand{}", false, "&permil;", "‰"),

    /* Arrows */
    ("larr", "\\leftarrow", true, "&larr;", "←"),
    ("leftarrow", "\\leftarrow", true, "&larr;", "←"),
    ("gets", "\\gets", true, "&larr;", "←"),
    ("lArr", "\\Leftarrow", true, "&lArr;", "⇐"),
    ("Leftarrow", "\\Leftarrow", true, "&lArr;", "⇐"),
    ("uarr", "\\uparrow", true, "&uarr;", "↑"),
    ("uparrow", "\\uparrow", true, "&uarr;", "↑"),
    ("uArr", "\\Uparrow", true, "&uArr;", "⇑"),
    ("Uparrow", "\\Uparrow", true, "&uArr;", "⇑"),
    ("rarr", "\\rightarrow", true, "&rarr;", "→"),
    ("to", "\\to", true, "&rarr;", "→"),
    ("rightarrow", "\\rightarrow", true, "&rarr;", "→"),
    ("rArr", "\\Rightarrow", true, "&rArr;", "⇒"),
    ("Rightarrow", "\\Rightarrow", true, "&rArr;", "⇒"),
    ("darr", "\\downarrow", true, "&darr;", "↓"),
    ("downarrow", "\\downarrow", true, "&darr;", "↓"),
    ("dArr", "\\Downarrow", true, "&dArr;", "⇓"),
    ("Downarrow", "\\Downarrow", true, "&dArr;", "⇓"),
    ("harr", "\\leftrightarrow", true, "&harr;", "↔"),
    ("leftrightarrow", "\\leftrightarrow", true, "&harr;", "↔"),
    ("hArr", "\\Leftrightarrow", true, "&hArr;", "⇔"),
    ("Leftrightarrow", "\\Leftrightarrow", true, "&hArr;", "⇔"),
    ("crarr", "\\hookleftarrow", true, "&crarr;", "↵"),
    ("hookleftarrow", "\\hookleftarrow", true, "&crarr;", "↵"),
    ("mapsto", "\\mapsto", true, "&#8614;", "↦"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_entity_resolves_all_forms() {
        let alpha = lookup("alpha").expect("alpha is an entity");
        assert_eq!(alpha.latex, "\\alpha");
        assert!(alpha.latex_math);
        assert_eq!(alpha.html, "&alpha;");
        assert_eq!(alpha.utf8, "α");
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(lookup("Delta").map(|e| e.utf8), Some("Δ"));
        assert_eq!(lookup("delta").map(|e| e.utf8), Some("δ"));
        assert!(lookup("DELTA").is_none());
    }

    #[test]
    fn unknown_name_is_not_an_entity() {
        assert!(lookup("frobnicate").is_none());
        assert!(!is_entity("textbf"));
    }

    #[test]
    fn names_are_unique() {
        assert_eq!(TABLE.len(), ENTRIES.len());
    }
}
