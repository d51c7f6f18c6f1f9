use anyhow::Result;

/// Fallback seed set used when the operator provides none: large,
/// link-dense, crawl-tolerant sites.
pub const DEFAULT_SEEDS: &[&str] = &[
    "https://en.wikipedia.org/wiki/Main_Page",
    "https://news.ycombinator.com/",
    "https://www.rust-lang.org/",
    "https://www.gutenberg.org/",
    "https://www.w3.org/",
    "https://lwn.net/",
    "https://www.bbc.com/news",
    "https://arxiv.org/",
];

/// Seeds come from --seed, a comma-separated --seeds list, or a file path
/// with one URL per line.
pub fn collect_seeds(seeds: Option<String>, seed: Option<String>) -> Result<Vec<String>> {
    let mut seed_urls: Vec<String> = Vec::new();
    if let Some(s) = seed {
        seed_urls.push(s);
    }
    if let Some(seeds_arg) = seeds {
        if std::path::Path::new(&seeds_arg).exists() {
            let content = std::fs::read_to_string(&seeds_arg)?;
            seed_urls.extend(
                content
                    .lines()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty() && !l.starts_with('#')),
            );
        } else {
            seed_urls.extend(
                seeds_arg
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            );
        }
    }
    if seed_urls.is_empty() {
        seed_urls.extend(DEFAULT_SEEDS.iter().map(|s| s.to_string()));
    }
    Ok(seed_urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_comma_separated_seeds() {
        let seeds = collect_seeds(
            Some("http://a.example/, http://b.example/ ,".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(seeds, vec!["http://a.example/", "http://b.example/"]);
    }

    #[test]
    fn single_seed_comes_first() {
        let seeds = collect_seeds(
            Some("http://b.example/".to_string()),
            Some("http://a.example/".to_string()),
        )
        .unwrap();
        assert_eq!(seeds[0], "http://a.example/");
        assert_eq!(seeds.len(), 2);
    }

    #[test]
    fn falls_back_to_default_seeds() {
        let seeds = collect_seeds(None, None).unwrap();
        assert_eq!(seeds.len(), DEFAULT_SEEDS.len());
    }
}
