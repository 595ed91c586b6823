mod helpers;

mod scrape_flow;
