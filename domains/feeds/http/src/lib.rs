pub mod handlers;
pub mod stats;

pub use handlers::{
    FeedHandlers, FeedServices, __path_get_banners, __path_get_live_tv,
    __path_get_match_details, __path_get_match_list,
    __path_get_match_odds, __path_get_results, __path_get_sidebar,
    __path_get_sports, __path_get_top_events, __path_get_virtual_tv,
    __path_post_priority_market, get_banners, get_live_tv,
    get_match_details, get_match_list, get_match_odds, get_results,
    get_sidebar, get_sports, get_top_events, get_virtual_tv,
    post_priority_market,
};
pub use stats::{StatsResponse, WorkerSnapshot, __path_get_stats, get_stats};
