fn main() {
    callsig_lib::run()
}
