// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fighter slugs used by the frontend mapped to start.gg character ids.

/// Look up the start.gg character id for a fighter slug (case-insensitive).
///
/// Returns `None` for unknown slugs; callers omit the selection in that case.
pub fn startgg_character_id(slug: &str) -> Option<u32> {
    let id = match slug.trim().to_lowercase().as_str() {
        "bayonetta" => 1271,
        "bowser_jr" => 1272,
        "bowser" => 1273,
        "captain_falcon" => 1274,
        "cloud" => 1275,
        "corrin" => 1276,
        "daisy" => 1277,
        "dark_pit" => 1278,
        "diddy_kong" => 1279,
        "donkey_kong" => 1280,
        "dr_mario" => 1282,
        "duck_hunt" => 1283,
        "falco" => 1285,
        "fox" => 1286,
        "ganondorf" => 1287,
        "greninja" => 1289,
        "ice_climbers" => 1290,
        "ike" => 1291,
        "inkling" => 1292,
        "jigglypuff" => 1293,
        "king_dedede" => 1294,
        "kirby" => 1295,
        "link" => 1296,
        "little_mac" => 1297,
        "lucario" => 1298,
        "lucas" => 1299,
        "lucina" => 1300,
        "luigi" => 1301,
        "mario" => 1302,
        "marth" => 1304,
        "mega_man" => 1305,
        "meta_knight" => 1307,
        "mewtwo" => 1310,
        "mii_brawler" | "mii_fighter" => 1311,
        "ness" => 1313,
        "olimar" => 1314,
        "pac_man" => 1315,
        "palutena" => 1316,
        "peach" => 1317,
        "pichu" => 1318,
        "pikachu" => 1319,
        "pit" => 1320,
        "pokemon_trainer" => 1321,
        "ridley" => 1322,
        "rob" => 1323,
        "robin" => 1324,
        "rosalina_and_luma" => 1325,
        "roy" => 1326,
        "ryu" => 1327,
        "samus" => 1328,
        "sheik" => 1329,
        "shulk" => 1330,
        "snake" => 1331,
        "sonic" => 1332,
        "toon_link" => 1333,
        "villager" => 1334,
        "wario" => 1335,
        "wii_fit_trainer" => 1336,
        "wolf" => 1337,
        "yoshi" => 1338,
        "young_link" => 1339,
        "zelda" => 1340,
        "zero_suit_samus" => 1341,
        "mr_game_and_watch" => 1405,
        "incineroar" | "gaogaen" => 1406,
        "king_k_rool" => 1407,
        "dark_samus" => 1408,
        "chrom" => 1409,
        "ken" => 1410,
        "simon" => 1411,
        "richter" => 1412,
        "isabelle" => 1413,
        "mii_swordfighter" => 1414,
        "mii_gunner" => 1415,
        "piranha_plant" | "packun_flower" => 1441,
        "joker" => 1453,
        "hero" | "dq_hero" => 1526,
        "banjo_kazooie" | "banjo_and_kazooie" => 1530,
        "terry" => 1532,
        "byleth" => 1539,
        "min_min" | "minmin" => 1747,
        "steve" => 1766,
        "sephiroth" => 1777,
        "pyra_mythra" | "homura" => 1795,
        "kazuya" => 1846,
        "sora" => 1897,
        _ => return None,
    };
    Some(id)
}
