use std::collections::HashMap;

use fronting_domain::Masquerade;

/// Shuffles each provider's candidate list independently (never across
/// providers) and interleaves the providers round-robin, so a run of
/// consecutive candidates pulled off the queue doesn't come from a single
/// CDN even before any vetting has happened.
pub fn load_candidates(by_provider: HashMap<String, Vec<Masquerade>>) -> Vec<Masquerade> {
    let mut shuffled: Vec<Vec<Masquerade>> = by_provider
        .into_values()
        .map(|mut list| {
            fisher_yates_shuffle(&mut list);
            list
        })
        .collect();

    let mut interleaved = Vec::new();
    loop {
        let mut progressed = false;
        for list in shuffled.iter_mut() {
            if let Some(item) = list.pop() {
                interleaved.push(item);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    interleaved
}

fn fisher_yates_shuffle<T>(items: &mut [T]) {
    if items.len() < 2 {
        return;
    }
    for i in (1..items.len()).rev() {
        let j = fastrand::usize(..=i);
        items.swap(i, j);
    }
}
