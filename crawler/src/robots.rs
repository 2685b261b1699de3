use std::time::Duration;

/// Rules from one origin's robots.txt that apply to this crawler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Robots {
    allows: Vec<String>,
    disallows: Vec<String>,
    crawl_delay: Option<Duration>,
}

impl Robots {
    /// Everything allowed, no delay: used when robots.txt is missing or unreachable.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse the groups addressed to `*` or to the product token of `agent`
    /// (the part before any `/`, compared case-insensitively).
    pub fn parse(txt: &str, agent: &str) -> Self {
        let agent_token = product_token(agent);
        let mut active = false;
        let mut in_agent_lines = false;
        let mut rules = Robots::default();
        for line in txt.lines() {
            let l = line.split('#').next().unwrap_or("").trim();
            if l.is_empty() { continue; }
            let Some((k, v)) = l.split_once(':') else { continue };
            let key = k.trim().to_lowercase();
            let val = v.trim();
            if key == "user-agent" {
                let group = product_token(val);
                let matches = group == "*" || (!group.is_empty() && group == agent_token);
                active = if in_agent_lines { active || matches } else { matches };
                in_agent_lines = true;
                continue;
            }
            in_agent_lines = false;
            if !active { continue; }
            match key.as_str() {
                "allow" if !val.is_empty() => rules.allows.push(val.to_string()),
                "disallow" if !val.is_empty() => rules.disallows.push(val.to_string()),
                "crawl-delay" => {
                    if let Ok(secs) = val.parse::<f64>() {
                        if secs.is_finite() && secs >= 0.0 {
                            rules.crawl_delay = Some(Duration::from_secs_f64(secs));
                        }
                    }
                }
                _ => {}
            }
        }
        rules
    }

    /// Longest matching prefix wins; ties go to Allow.
    pub fn allows(&self, path: &str) -> bool {
        let longest = |rules: &[String]| rules.iter().filter(|r| path.starts_with(r.as_str())).map(|r| r.len()).max();
        match (longest(&self.allows), longest(&self.disallows)) {
            (Some(a), Some(d)) => a >= d,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }

    pub fn crawl_delay(&self) -> Option<Duration> {
        self.crawl_delay
    }
}

fn product_token(agent: &str) -> String {
    agent.split('/').next().unwrap_or_default().trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXT: &str = "\
# comment
User-agent: otherbot
Disallow: /

User-agent: *
Disallow: /private
Allow: /private/public
Crawl-delay: 0.5

User-agent: LinkRank-Bot
User-agent: extra
Disallow: /nolinkrank # inline comment
";

    #[test]
    fn longest_prefix_wins() {
        let r = Robots::parse(TXT, "linkrank-bot/0.1");
        assert!(r.allows("/"));
        assert!(!r.allows("/private/x"));
        assert!(r.allows("/private/public/page"));
        assert!(!r.allows("/nolinkrank/page"));
        assert_eq!(r.crawl_delay(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn groups_for_other_agents_are_ignored() {
        let r = Robots::parse(TXT, "somebot");
        assert!(r.allows("/nolinkrank"));
        assert!(r.allows("/anything"));
    }

    #[test]
    fn partial_agent_names_do_not_match() {
        let txt = "User-agent: bot\nDisallow: /\n\nUser-agent: link\nDisallow: /\n";
        let r = Robots::parse(txt, "linkrank-bot/0.1");
        assert!(r.allows("/anything"));
        assert!(!Robots::parse(txt, "bot/2.0").allows("/anything"));
    }

    #[test]
    fn empty_or_missing_rules_allow_everything() {
        assert!(Robots::allow_all().allows("/x"));
        assert!(Robots::parse("User-agent: *\nDisallow:\n", "bot").allows("/x"));
    }
}
