use std::cmp::Ordering;

/// dpkg style version comparison over raw version strings.
///
/// A version is `[epoch:]upstream[-revision]`. Epochs are compared numerically,
/// then the upstream part, then the revision, each with [`cmp_fragment`].
/// Any string is accepted, so this is a total order over all strings.
pub fn cmp_versions(a: &str, b: &str) -> Ordering {
    let (a_epoch, a_upstream, a_revision) = split_version(a);
    let (b_epoch, b_upstream, b_revision) = split_version(b);

    cmp_number(a_epoch, b_epoch)
        .then_with(|| cmp_fragment(a_upstream, b_upstream))
        .then_with(|| cmp_fragment(a_revision, b_revision))
}

/// Split a version string into (epoch, upstream, revision).
/// Missing parts are returned as empty strings.
pub(super) fn split_version(v: &str) -> (&str, &str, &str) {
    let (epoch, rest) = match v.split_once(':') {
        Some((epoch, rest)) if !epoch.is_empty() && epoch.bytes().all(|c| c.is_ascii_digit()) => {
            (epoch, rest)
        }
        _ => ("", v),
    };
    let (upstream, revision) = match rest.rfind('-') {
        Some(pos) => (&rest[..pos], &rest[pos + 1..]),
        None => (rest, ""),
    };

    (epoch, upstream, revision)
}

/// Compare upstream versions or revisions.
///
/// Both strings are walked in alternating runs of non-digits and digits.
/// The first pair of runs that differs decides.
fn cmp_fragment(mut a: &str, mut b: &str) -> Ordering {
    while !a.is_empty() || !b.is_empty() {
        let (a_lex, a_rest) = take_run(a, |c| !c.is_ascii_digit());
        let (b_lex, b_rest) = take_run(b, |c| !c.is_ascii_digit());
        match cmp_lexical(a_lex, b_lex) {
            Ordering::Equal => (),
            res => return res,
        }

        let (a_num, a_rest) = take_run(a_rest, |c| c.is_ascii_digit());
        let (b_num, b_rest) = take_run(b_rest, |c| c.is_ascii_digit());
        let res = match (a_num.is_empty(), b_num.is_empty()) {
            (true, true) => Ordering::Equal,
            // A run of zeros still beats no run at all
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => cmp_number(a_num, b_num),
        };
        if res != Ordering::Equal {
            return res;
        }

        a = a_rest;
        b = b_rest;
    }

    Ordering::Equal
}

#[inline]
fn take_run(s: &str, pred: impl Fn(char) -> bool) -> (&str, &str) {
    let end = s.find(|c| !pred(c)).unwrap_or(s.len());
    s.split_at(end)
}

/// Compare two non-digit runs character by character.
fn cmp_lexical(a: &str, b: &str) -> Ordering {
    let mut a = a.chars();
    let mut b = b.chars();
    loop {
        let (x, y) = (a.next(), b.next());
        if x.is_none() && y.is_none() {
            return Ordering::Equal;
        }
        match rank(x).cmp(&rank(y)) {
            Ordering::Equal => (),
            res => return res,
        }
    }
}

/// Sort weight of a character inside a non-digit run.
/// `~` < end of run < any other character, by code.
#[inline]
fn rank(c: Option<char>) -> i64 {
    match c {
        Some('~') => -1,
        None => 0,
        Some(c) => c as i64,
    }
}

/// Numeric comparison of two digit strings of any length.
/// An empty string counts as zero.
fn cmp_number(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
