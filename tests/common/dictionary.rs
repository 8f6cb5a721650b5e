use std::collections::HashSet;

use tile_cascade::cascade::generation::WordOracle;

const WORDS: &str = "
    ACE ACT ADD AGE AGO AID AIM AIR ALE ALL AND ANT ANY APE ARC ARE ARM ART ASH ASK ATE AWE AXE
    BAD BAG BAN BAR BAT BED BEE BET BID BIG BIN BIT BOA BOG BOW BOX BOY BUD BUG BUN BUS BUT BUY
    CAB CAN CAP CAR CAT COD COG CON COT COW CRY CUB CUP CUT DAB DAM DEN DEW DID DIE DIG DIN DOE
    DOG DON DOT DRY DUE DUG EAR EAT EEL EGG ELF ELM END ERA EVE EWE EYE FAN FAR FAT FED FEE FEN
    FEW FIG FIN FIR FIT FLY FOE FOG FOR FOX FRO FUN FUR GAP GAS GEL GEM GET GIN GNU GOD GOT GUM
    GUN GUT GUY HAD HAM HAS HAT HEN HER HID HIM HIP HIS HIT HOE HOG HOT HOW HUE HUG HUT ICE ILL
    INK INN ION IRE IRON ITS JAR JAW JET JOB JOG JOT JOY KEG KEN KID KIN KIT LAD LAG LAP LAW LAY
    LED LEG LET LID LIE LIP LIT LOG LOT LOW MAD MAN MAP MAT MEN MET MID MOB MOD MOP MUD MUG NAB
    NAG NAP NET NEW NIL NIP NOD NONE NOR NOT NOW NUN NUT OAK OAR OAT ODD ODE OFF OFT OIL OLD ONE
    OPT ORB ORE OUR OUT OWE OWL OWN PAD PAN PAT PAW PAY PEA PEG PEN PET PIE PIG PIN PIT POD POT
    RAG RAN RAT RAW RED RID RIG RIM RIP ROD ROE ROT ROW RUB RUG RUN RUT SAD SAG SAT SAW SEA SEE
    SET SEW SHE SIN SIR SIT SOD SON SOT SOW SUN TAB TAG TAN TAP TAR TEA TEN THE TIE TIN TIP TOE
    TON TOO TOP TOT TOW TOY TUB TUG URN USE VAN VAT VET VIA VIE WAD WAG WAR WAS WAY WEB WED WET
    WHO WIG WIN WIT WOE WON YAK YAM YEN YES YET YEW ZAP ZIT ZOO
    ALSO AREA BEAN BEAR BOAT CARE CART DARE DEAR DOOR EARN EAST EDIT GATE GOAT HEAR HEAT IDEA IRIS
    LANE LATE LEAN NEAR NEST NOTE OATS RAIN RATE READ REST RIDE ROAD ROSE SAND SEAT SENT SIDE SITE
    SNOT SOIL STAR STEM TEAR TENT TIDE TIRE TOAD TONE TREE WEST
    ALERT ALONE ARISE ATONE IRATE LASER NOTES RAISE RATIO SANER SNARE STAIR STARE STEAL STONE TEARS
";

/// A word oracle backed by a small, fixed list of English words.
pub(crate) struct WordList {
    words: HashSet<&'static str>,
    prefixes: HashSet<String>,
}

impl WordList {
    pub(crate) fn english() -> Self {
        let words: HashSet<&'static str> = WORDS.split_whitespace().collect();
        let prefixes = words
            .iter()
            .flat_map(|word| (1..=word.len()).map(move |len| word[..len].to_string()))
            .collect();
        Self { words, prefixes }
    }
}

impl WordOracle for WordList {
    fn is_valid_word(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    fn is_valid_prefix(&self, prefix: &str) -> bool {
        self.prefixes.contains(prefix)
    }
}

/// An oracle that accepts nothing, so no board is ever good enough.
pub(crate) struct NoWords;

impl WordOracle for NoWords {
    fn is_valid_word(&self, _: &str) -> bool {
        false
    }
}
